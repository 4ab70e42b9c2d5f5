//! Task processing.
//!
//! A [`Task`] binds one measurement file to the inserter for its
//! destination table, parses the file line by line, and guarantees
//! durability with a retried end-of-file flush before reporting success.

mod source;

pub use source::open as open_source;

use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tokio_retry::RetryIf;

use crate::error_handling::{get_retry_strategy, InsertError, TaskError};
use crate::inserter::Inserter;
use crate::parse;

/// Summary of one processed task file.
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// The normalized task filename.
    pub filename: String,
    /// Lines successfully parsed and handed to the inserter.
    pub rows_inserted: usize,
    /// Lines that failed to parse and were skipped.
    pub parse_errors: usize,
    /// Rows permanently dropped during this task's final flush.
    pub rows_dropped: usize,
}

/// One measurement file bound to its destination inserter.
pub struct Task {
    filename: String,
    inserter: Arc<Inserter>,
}

impl Task {
    /// Binds a normalized task filename to its destination inserter.
    pub fn new(filename: impl Into<String>, inserter: Arc<Inserter>) -> Self {
        Task {
            filename: filename.into(),
            inserter,
        }
    }

    /// Parses every line of the task file into the inserter, then flushes.
    ///
    /// Parse failures are counted and skipped; one bad line never aborts the
    /// file. Insert errors mid-file are logged but processing continues —
    /// retryable rows stay buffered and permanent drops have already been
    /// counted by the inserter. The final flush is retried with exponential
    /// backoff on fatal errors; only a flush that stays fatal fails the
    /// task.
    pub async fn process_all(&self) -> Result<TaskReport, TaskError> {
        let reader = source::open(&self.filename).await?;
        let mut lines = reader.lines();

        let mut report = TaskReport {
            filename: self.filename.clone(),
            rows_inserted: 0,
            parse_errors: 0,
            rows_dropped: 0,
        };

        let mut line_number = 0;
        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if parse::is_blank(&line) {
                continue;
            }
            match parse::parse_line(&self.filename, line_number, &line) {
                Ok(row) => {
                    report.rows_inserted += 1;
                    if let Err(e) = self.inserter.insert_row(row).await {
                        // Retryable rows are still buffered; permanent drops
                        // are already counted. Keep consuming the file.
                        log::warn!("Insert error in {}: {}", self.filename, e);
                        if let InsertError::RowsDropped { failures } = e {
                            report.rows_dropped += failures.len();
                        }
                    }
                }
                Err(e) => {
                    report.parse_errors += 1;
                    log::warn!("{}", e);
                }
            }
        }

        // End-of-file flush: durability before success is reported.
        let flushed = RetryIf::spawn(
            get_retry_strategy(),
            || self.inserter.flush(),
            |e: &InsertError| matches!(e, InsertError::Fatal(_)),
        )
        .await;
        match flushed {
            Ok(()) => {}
            Err(InsertError::RowsDropped { failures }) => {
                report.rows_dropped += failures.len();
            }
            Err(e @ InsertError::Fatal(_)) => return Err(TaskError::Flush(e)),
        }

        log::info!(
            "Processed {}: {} rows inserted, {} parse errors, {} dropped",
            report.filename,
            report.rows_inserted,
            report.parse_errors,
            report.rows_dropped
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InserterParams;
    use crate::error_handling::{FatalError, FatalKind, UploadError};
    use crate::inserter::FakeUploader;
    use std::io::Write;

    fn fixture(lines: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(lines.as_bytes()).expect("write fixture");
        file
    }

    fn task_over_fake(path: &str, buffer_size: usize) -> (Task, Arc<Inserter>, FakeUploader) {
        let fake = FakeUploader::new();
        let params = InserterParams::new("measurements", "ndt_test").with_buffer_size(buffer_size);
        let inserter = Arc::new(
            Inserter::new(params, Some(Box::new(fake.clone()))).expect("fake inserter"),
        );
        (Task::new(path, Arc::clone(&inserter)), inserter, fake)
    }

    #[tokio::test]
    async fn test_process_all_inserts_and_flushes() {
        let file = fixture("{\"mbps\": 1}\n{\"mbps\": 2}\n{\"mbps\": 3}\n");
        let (task, inserter, fake) = task_over_fake(file.path().to_str().unwrap(), 2);

        let report = task.process_all().await.expect("task succeeds");
        assert_eq!(report.rows_inserted, 3);
        assert_eq!(report.parse_errors, 0);
        assert_eq!(inserter.accepted(), 3);
        assert_eq!(inserter.rows_in_buffer(), 0);
        // One threshold flush of 2 rows, one end-of-file flush of 1.
        assert_eq!(fake.call_count(), 2);
    }

    #[tokio::test]
    async fn test_process_all_skips_bad_lines() {
        let file = fixture("{\"mbps\": 1}\nnot json\n\n{\"mbps\": 2}\n");
        let (task, inserter, _fake) = task_over_fake(file.path().to_str().unwrap(), 100);

        let report = task.process_all().await.expect("task succeeds");
        assert_eq!(report.rows_inserted, 2);
        assert_eq!(report.parse_errors, 1);
        assert_eq!(inserter.accepted(), 2);
    }

    #[tokio::test]
    async fn test_final_flush_retries_fatal_errors() {
        let file = fixture("{\"mbps\": 1}\n");
        let (task, inserter, fake) = task_over_fake(file.path().to_str().unwrap(), 100);
        // First flush attempt fails, the retry succeeds.
        fake.fail_next(UploadError::Fatal(FatalError::new(
            FatalKind::Backend,
            "injected",
        )));

        task.process_all().await.expect("retry should recover");
        assert_eq!(inserter.accepted(), 1);
        assert_eq!(fake.call_count(), 2);
    }
}
