//! measurement_etl library: batched warehouse ingestion.
//!
//! This library parses measurement task files and streams their rows into
//! an analytical warehouse table through a buffered batch
//! [`Inserter`](inserter::Inserter). Rows accumulate under a per-inserter
//! lock and are written in bulk once a size threshold is reached; per-row
//! failures from the backend are classified into retryable (requeued) and
//! permanent (dropped, counted) outcomes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use measurement_etl::config::InserterParams;
//! use measurement_etl::inserter::{FakeUploader, Inserter, MapSaver};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let params = InserterParams::new("measurements", "ndt_test").with_buffer_size(100);
//! let inserter = Arc::new(Inserter::new(params, Some(Box::new(FakeUploader::new())))?);
//!
//! let row = MapSaver::from_serialize(&serde_json::json!({"download_mbps": 94.2}))?;
//! inserter.insert_row(row).await?;
//! inserter.flush().await?;
//! assert_eq!(inserter.accepted(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context.

#![warn(missing_docs)]

pub mod config;
pub mod error_handling;
pub mod etl;
pub mod initialization;
pub mod inserter;
pub mod parse;
pub mod task;

// Re-export public API
pub use config::{Config, InserterParams, LogFormat, LogLevel};
pub use run::{run_tasks, EtlReport};

// Internal run module (worker orchestration)
mod run {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use anyhow::Result;
    use futures::stream::{self, StreamExt};
    use log::{info, warn};

    use crate::config::{Config, InserterParams};
    use crate::etl::{decode_filename, partition_suffix, DataType};
    use crate::inserter::{FakeUploader, Inserter, Uploader};
    use crate::task::Task;

    /// Destination table for task files that don't match the archive layout
    /// (local fixtures, ad-hoc URLs).
    const FALLBACK_TABLE: &str = "etl_test";

    /// Results of one worker run across all task files.
    #[derive(Debug, Clone)]
    pub struct EtlReport {
        /// Number of task files processed.
        pub tasks: usize,
        /// Task files that failed outright (unreadable, flush stayed fatal).
        pub failed_tasks: usize,
        /// Rows parsed and handed to an inserter.
        pub rows_inserted: usize,
        /// Lines skipped because they failed to parse.
        pub parse_errors: usize,
        /// Rows acknowledged by the backend, across all inserters.
        pub rows_accepted: usize,
        /// Rows permanently dropped, across all inserters.
        pub rows_dropped: usize,
        /// Wall-clock duration of the run.
        pub elapsed_seconds: f64,
    }

    /// Processes every configured task file, sharing one inserter per
    /// destination table partition.
    ///
    /// Task files are processed concurrently up to `max_concurrency`;
    /// concurrency above that comes from sharding across tables, not from
    /// parallel flushes on one inserter.
    pub async fn run_tasks(config: Config) -> Result<EtlReport> {
        let started = Instant::now();

        // Normalize and classify every task up front so task files headed
        // for the same table partition share one inserter.
        let mut inserters: HashMap<String, Arc<Inserter>> = HashMap::new();
        let mut tasks: Vec<Task> = Vec::new();
        for raw in &config.filenames {
            let filename = normalize_filename(raw);
            let (table, suffix) = match DataType::from_filename(&filename) {
                Some(data_type) => (data_type.table(), partition_suffix(&filename)),
                None => {
                    warn!(
                        "{} does not match the archive layout, routing to {}",
                        filename, FALLBACK_TABLE
                    );
                    (FALLBACK_TABLE, None)
                }
            };

            let key = match &suffix {
                Some(s) => format!("{}{}", table, s),
                None => table.to_string(),
            };
            let inserter = match inserters.get(&key) {
                Some(existing) => Arc::clone(existing),
                None => {
                    let mut params = InserterParams::new(&config.dataset, table)
                        .with_buffer_size(config.buffer_size)
                        .with_put_timeout(Duration::from_secs(config.timeout_seconds));
                    if let Some(s) = &suffix {
                        params = params.with_suffix(s.clone());
                    }
                    let uploader: Option<Box<dyn Uploader>> = if config.dry_run {
                        Some(Box::new(FakeUploader::new()))
                    } else {
                        None
                    };
                    let created = Arc::new(Inserter::new(params, uploader)?);
                    inserters.insert(key, Arc::clone(&created));
                    created
                }
            };
            tasks.push(Task::new(filename, inserter));
        }

        let task_count = tasks.len();
        let results: Vec<_> = stream::iter(tasks)
            .map(|task| async move { task.process_all().await })
            .buffer_unordered(config.max_concurrency.max(1))
            .collect()
            .await;

        let mut report = EtlReport {
            tasks: task_count,
            failed_tasks: 0,
            rows_inserted: 0,
            parse_errors: 0,
            rows_accepted: 0,
            rows_dropped: 0,
            elapsed_seconds: 0.0,
        };
        for result in results {
            match result {
                Ok(task_report) => {
                    report.rows_inserted += task_report.rows_inserted;
                    report.parse_errors += task_report.parse_errors;
                }
                Err(e) => {
                    report.failed_tasks += 1;
                    warn!("Task failed: {}", e);
                }
            }
        }
        for inserter in inserters.values() {
            report.rows_accepted += inserter.accepted();
            report.rows_dropped += inserter.dropped();
        }
        report.elapsed_seconds = started.elapsed().as_secs_f64();

        info!(
            "Run complete: {} tasks ({} failed), {} rows accepted, {} dropped, {} parse errors in {:.1}s",
            report.tasks,
            report.failed_tasks,
            report.rows_accepted,
            report.rows_dropped,
            report.parse_errors,
            report.elapsed_seconds
        );
        Ok(report)
    }

    /// Normalizes a raw task argument; names that are neither `gs://` paths
    /// nor base64 encodings of one pass through as local paths or URLs.
    fn normalize_filename(raw: &str) -> String {
        decode_filename(raw).unwrap_or_else(|_| raw.to_string())
    }
}
