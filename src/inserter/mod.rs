//! Buffered batch inserter.
//!
//! The [`Inserter`] accumulates rows from any number of concurrent
//! producers and writes them to the warehouse in bulk once a size threshold
//! is reached, or when a caller flushes explicitly. Flushing eagerly at the
//! threshold bounds memory and request size; flushing only at the threshold
//! amortizes the fixed cost of a bulk-write call.
//!
//! Failure handling is centralized here: fatal (whole-batch) errors leave
//! the buffer untouched for a later retry, retryable per-row failures are
//! requeued, and only permanent per-row failures are ever dropped — always
//! counted and reported in the returned error.

mod bigquery;
mod fake;
mod row;
mod uploader;


pub use bigquery::StreamingUploader;
pub use fake::FakeUploader;
pub use row::{BoxedRow, EncodedRow, MapSaver, RowEncodeError, RowSaver};
pub use uploader::Uploader;

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

use crate::config::InserterParams;
use crate::error_handling::{
    FailureKind, InitializationError, InsertError, PartialInsertError, RowFailure, UploadError,
};

/// Threshold-triggered buffered inserter for one destination table.
///
/// Safe for concurrent use: the row buffer is guarded by a single lock
/// scoped to this instance, held for the duration of a flush so that a row
/// appended concurrently with an in-progress flush either lands in the
/// flushed batch or stays buffered for the next one — never both, never
/// neither. Callers needing higher write throughput should shard across
/// multiple inserters rather than expect parallel flushes from one.
pub struct Inserter {
    params: InserterParams,
    uploader: Box<dyn Uploader>,
    buffer: Mutex<Vec<BoxedRow>>,
    // Counter mirrors, updated under the buffer lock but readable without it.
    accepted: AtomicUsize,
    buffered: AtomicUsize,
    dropped: AtomicUsize,
}

/// Outcome of classifying a partial insert error against the batch that
/// produced it.
pub struct ErrorDisposition {
    /// Rows to requeue for the next flush attempt, in original order.
    pub retry: Vec<BoxedRow>,
    /// Rows the backend durably accepted.
    pub accepted: usize,
    /// Permanently rejected rows, dropped from future retry.
    pub dropped: Vec<RowFailure>,
}

impl Inserter {
    /// Creates an inserter over the given upload backend.
    ///
    /// When `uploader` is `None` the production streaming backend is wired
    /// from the environment and the dataset/table identifiers in `params`;
    /// this is the sole point where the core touches the production backend,
    /// which keeps it fully substitutable in tests.
    pub fn new(
        params: InserterParams,
        uploader: Option<Box<dyn Uploader>>,
    ) -> Result<Self, InitializationError> {
        let uploader = match uploader {
            Some(u) => u,
            None => Box::new(StreamingUploader::from_env(&params)?),
        };
        Ok(Inserter {
            params,
            uploader,
            buffer: Mutex::new(Vec::new()),
            accepted: AtomicUsize::new(0),
            buffered: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        })
    }

    /// Appends one row to the buffer, flushing first if the buffer reaches
    /// the configured threshold.
    ///
    /// The row itself is never lost silently: on a flush failure, rows that
    /// failed retryably remain queued, so this call surfaces an error only
    /// on a fatal flush failure or a permanent per-row failure.
    pub async fn insert_row(&self, row: impl RowSaver + 'static) -> Result<(), InsertError> {
        self.insert_rows(vec![Box::new(row)]).await
    }

    /// Appends multiple rows, flushing every time the cumulative length
    /// crosses the threshold.
    ///
    /// Equivalent in effect to sequential [`insert_row`](Self::insert_row)
    /// calls, under one lock acquisition. All input rows are consumed even
    /// when an intermediate flush fails; the first error is returned after
    /// the remaining rows have been buffered.
    pub async fn insert_rows(&self, rows: Vec<BoxedRow>) -> Result<(), InsertError> {
        let mut buffer = self.buffer.lock().await;
        let mut first_err: Option<InsertError> = None;
        for row in rows {
            buffer.push(row);
            self.buffered.store(buffer.len(), Ordering::SeqCst);
            if buffer.len() >= self.params.buffer_size {
                if let Err(e) = self.flush_locked(&mut buffer).await {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Writes all currently buffered rows regardless of the threshold.
    ///
    /// Blocks until the bulk upload completes. On an empty buffer this is a
    /// no-op with no backend call. On partial success, accepted rows leave
    /// the buffer, retryable rows are requeued, and permanent failures are
    /// surfaced in the returned aggregate error.
    pub async fn flush(&self) -> Result<(), InsertError> {
        let mut buffer = self.buffer.lock().await;
        self.flush_locked(&mut buffer).await
    }

    /// Monotonically increasing count of rows acknowledged by the backend.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Current number of buffered rows.
    pub fn rows_in_buffer(&self) -> usize {
        self.buffered.load(Ordering::SeqCst)
    }

    /// Total rows permanently dropped (schema errors, unserializable rows).
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    /// The immutable configuration this inserter was built with.
    pub fn params(&self) -> &InserterParams {
        &self.params
    }

    /// Partitions the failed rows of a batch by cause.
    ///
    /// Pure classification: rows not named in `err` were accepted, rows
    /// with a retryable cause are returned for requeueing in their original
    /// relative order, and rows with a permanent cause are dropped. Counter
    /// updates and logging are left to the caller, so this is testable with
    /// no backend at all.
    pub fn handle_insert_errors(batch: Vec<BoxedRow>, err: PartialInsertError) -> ErrorDisposition {
        let mut failed: Vec<Option<RowFailure>> = Vec::new();
        failed.resize_with(batch.len(), || None);
        for failure in err.failures {
            let row_index = failure.row_index;
            if row_index < batch.len() {
                failed[row_index] = Some(failure);
            } else {
                log::warn!(
                    "Backend reported failure for row {} in a batch of {}, ignoring",
                    failure.row_index,
                    batch.len()
                );
            }
        }

        let mut retry = Vec::new();
        let mut dropped = Vec::new();
        let mut accepted = 0;
        for (row, failure) in batch.into_iter().zip(failed.into_iter()) {
            match failure {
                None => accepted += 1,
                Some(f) if f.kind == FailureKind::Retryable => retry.push(row),
                Some(f) => dropped.push(f),
            }
        }

        ErrorDisposition {
            retry,
            accepted,
            dropped,
        }
    }

    /// Flushes with the buffer lock already held.
    async fn flush_locked(&self, buffer: &mut Vec<BoxedRow>) -> Result<(), InsertError> {
        if buffer.is_empty() {
            return Ok(());
        }

        let rows = std::mem::take(buffer);
        log::debug!(
            "Flushing {} rows to {}.{}",
            rows.len(),
            self.params.dataset,
            self.params.table_with_suffix()
        );

        // Rows are saved at flush time. A row that cannot produce its field
        // map is a permanent failure for that row only; the rest of the
        // batch is still attempted.
        let mut savers = Vec::with_capacity(rows.len());
        let mut encoded = Vec::with_capacity(rows.len());
        let mut drops: Vec<RowFailure> = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            match row.save() {
                Ok(enc) => {
                    encoded.push(enc);
                    savers.push(row);
                }
                Err(e) => drops.push(RowFailure {
                    row_index: index,
                    kind: FailureKind::Permanent,
                    reason: "unserializable".to_string(),
                    message: e.to_string(),
                }),
            }
        }

        if encoded.is_empty() {
            self.buffered.store(buffer.len(), Ordering::SeqCst);
            return self.finish_drops(drops);
        }

        let batch_size = encoded.len();
        match self.uploader.put(encoded, self.params.put_timeout).await {
            Ok(written) => {
                if written != batch_size {
                    log::warn!(
                        "Backend acknowledged {} of {} rows without an error",
                        written,
                        batch_size
                    );
                }
                self.accepted.fetch_add(written, Ordering::SeqCst);
                self.buffered.store(buffer.len(), Ordering::SeqCst);
                self.finish_drops(drops)
            }
            Err(UploadError::Fatal(e)) => {
                // Whole batch rejected, no partial information: requeue every
                // sendable row untouched so the caller may retry the flush.
                // Rows that failed to save are dropped regardless; re-saving
                // a deterministic failure cannot succeed.
                *buffer = savers;
                self.buffered.store(buffer.len(), Ordering::SeqCst);
                log::error!("Flush of {} rows failed: {}", batch_size, e);
                if !drops.is_empty() {
                    self.record_drops(&drops);
                }
                Err(InsertError::Fatal(e))
            }
            Err(UploadError::Partial(partial)) => {
                let disposition = Self::handle_insert_errors(savers, partial);
                self.accepted
                    .fetch_add(disposition.accepted, Ordering::SeqCst);
                // Retryable rows go back to the front of the buffer in their
                // original order; nothing was appended behind them while the
                // lock was held.
                *buffer = disposition.retry;
                self.buffered.store(buffer.len(), Ordering::SeqCst);
                if !buffer.is_empty() {
                    log::info!(
                        "Requeued {} retryable rows for the next flush",
                        buffer.len()
                    );
                }
                drops.extend(disposition.dropped);
                self.finish_drops(drops)
            }
        }
    }

    /// Counts and logs permanent drops, surfacing them as the aggregate
    /// error when any occurred.
    fn finish_drops(&self, drops: Vec<RowFailure>) -> Result<(), InsertError> {
        if drops.is_empty() {
            return Ok(());
        }
        self.record_drops(&drops);
        Err(InsertError::RowsDropped { failures: drops })
    }

    fn record_drops(&self, drops: &[RowFailure]) {
        self.dropped.fetch_add(drops.len(), Ordering::SeqCst);
        for failure in drops {
            log::warn!("Dropping row permanently: {}", failure);
        }
    }
}
