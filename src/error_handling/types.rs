//! Error type definitions.
//!
//! This module defines the error taxonomy used throughout the application:
//! initialization failures, whole-batch (fatal) upload failures, per-row
//! insertion failures, and the aggregate errors surfaced to callers of the
//! batch inserter.

use std::fmt;

use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] log::SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    /// Required configuration (e.g. project id, access token) is missing.
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),
}

/// Broad categories for whole-batch upload failures.
///
/// A fatal failure rejects the entire batch with no per-row information;
/// the buffered rows are left untouched so the caller may retry the flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum FatalKind {
    /// Could not reach the backend (DNS, TCP, TLS).
    Connect,
    /// The request or the configured per-flush timeout expired.
    Timeout,
    /// The backend rejected our credentials (401/403).
    Auth,
    /// The request itself was malformed (400/404).
    InvalidRequest,
    /// The backend failed internally (5xx).
    Backend,
    /// Anything that doesn't fit the categories above.
    Other,
}

impl FatalKind {
    /// Human-readable label used in log and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            FatalKind::Connect => "connection error",
            FatalKind::Timeout => "timeout",
            FatalKind::Auth => "authentication error",
            FatalKind::InvalidRequest => "invalid request",
            FatalKind::Backend => "backend error",
            FatalKind::Other => "other error",
        }
    }
}

impl fmt::Display for FatalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A whole-batch upload failure. No rows were accepted.
#[derive(Error, Debug)]
#[error("bulk upload failed ({kind}): {message}")]
pub struct FatalError {
    /// Failure category, used by callers to decide retry timing.
    pub kind: FatalKind,
    /// Backend- or transport-supplied detail.
    pub message: String,
}

impl FatalError {
    /// Builds a fatal error from a category and detail message.
    pub fn new(kind: FatalKind, message: impl Into<String>) -> Self {
        FatalError {
            kind,
            message: message.into(),
        }
    }
}

/// Whether a per-row failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient condition (backend unavailable, quota); the row is requeued.
    Retryable,
    /// The row's data will never be accepted (schema mismatch, bad value);
    /// the row is dropped after being counted.
    Permanent,
}

/// One rejected row from a partially failed bulk upload.
#[derive(Debug, Clone)]
pub struct RowFailure {
    /// Index of the row within the uploaded batch.
    pub row_index: usize,
    /// Retryable or permanent, tagged at the port boundary.
    pub kind: FailureKind,
    /// Backend reason code (e.g. "invalid", "backendError").
    pub reason: String,
    /// Human-readable detail from the backend.
    pub message: String,
}

impl fmt::Display for RowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: {} ({})",
            self.row_index, self.reason, self.message
        )
    }
}

/// A bulk upload outcome where some rows succeeded and others were rejected.
///
/// Produced by an [`Uploader`](crate::inserter::Uploader) implementation,
/// consumed exactly once by the inserter's error classification, then
/// discarded. Rows not listed in `failures` were durably accepted.
#[derive(Error, Debug)]
#[error("{} row(s) rejected by bulk upload", failures.len())]
pub struct PartialInsertError {
    /// The rejected rows, in batch-index order.
    pub failures: Vec<RowFailure>,
}

/// Errors returned by [`Uploader::put`](crate::inserter::Uploader::put).
#[derive(Error, Debug)]
pub enum UploadError {
    /// The entire batch was rejected; no partial information is available.
    #[error(transparent)]
    Fatal(#[from] FatalError),

    /// Some rows were accepted, others rejected.
    #[error(transparent)]
    Partial(#[from] PartialInsertError),
}

/// Aggregate error surfaced by `insert_row` / `insert_rows` / `flush`.
///
/// Returned only when a flush failed fatally or at least one row was
/// permanently dropped; retryable row failures are handled internally by
/// requeueing and never surface here.
#[derive(Error, Debug)]
pub enum InsertError {
    /// The flush failed as a whole; buffered rows were left in place.
    #[error(transparent)]
    Fatal(#[from] FatalError),

    /// One or more rows were permanently rejected and dropped.
    #[error("{} row(s) permanently dropped: {}", .failures.len(), format_failures(.failures))]
    RowsDropped {
        /// The dropped rows with their backend-supplied causes.
        failures: Vec<RowFailure>,
    },
}

/// Formats the first few row failures for an error message, eliding the rest.
fn format_failures(failures: &[RowFailure]) -> String {
    const SHOWN: usize = 3;
    let mut parts: Vec<String> = failures.iter().take(SHOWN).map(|f| f.to_string()).collect();
    if failures.len() > SHOWN {
        parts.push(format!("and {} more", failures.len() - SHOWN));
    }
    parts.join("; ")
}

/// Errors raised while locating or reading a task file.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task filename is neither a `gs://` path nor valid base64.
    #[error("Invalid task filename: {0}")]
    InvalidFilename(String),

    /// The task path does not match the expected archive layout.
    #[error("Unrecognized task path: {0}")]
    UnrecognizedPath(String),

    /// The task file could not be read from local disk.
    #[error("Task file read error: {0}")]
    Io(#[from] std::io::Error),

    /// The task file could not be downloaded from the object store.
    #[error("Task file download error: {0}")]
    Download(#[from] reqwest::Error),

    /// The end-of-file flush could not drain the buffer.
    #[error("Final flush failed: {0}")]
    Flush(#[from] InsertError),
}

/// A single measurement line that could not be parsed into a row.
#[derive(Error, Debug)]
#[error("parse error at {filename}:{line}: {message}")]
pub struct ParseError {
    /// The task file the line came from.
    pub filename: String,
    /// One-based line number within the file.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_fatal_kind_as_str() {
        assert_eq!(FatalKind::Timeout.as_str(), "timeout");
        assert_eq!(FatalKind::Auth.as_str(), "authentication error");
        assert_eq!(FatalKind::Backend.as_str(), "backend error");
    }

    #[test]
    fn test_all_fatal_kinds_have_string_representation() {
        for kind in FatalKind::iter() {
            assert!(!kind.as_str().is_empty(), "{:?} should have a label", kind);
        }
    }

    #[test]
    fn test_fatal_error_display() {
        let e = FatalError::new(FatalKind::Connect, "connection refused");
        assert_eq!(
            e.to_string(),
            "bulk upload failed (connection error): connection refused"
        );
    }

    #[test]
    fn test_rows_dropped_display_elides_long_lists() {
        let failures: Vec<RowFailure> = (0..5)
            .map(|i| RowFailure {
                row_index: i,
                kind: FailureKind::Permanent,
                reason: "invalid".to_string(),
                message: "bad value".to_string(),
            })
            .collect();
        let err = InsertError::RowsDropped { failures };
        let msg = err.to_string();
        assert!(msg.starts_with("5 row(s) permanently dropped"));
        assert!(msg.contains("and 2 more"));
    }

    #[test]
    fn test_partial_insert_error_display() {
        let err = PartialInsertError {
            failures: vec![RowFailure {
                row_index: 1,
                kind: FailureKind::Permanent,
                reason: "invalid".to_string(),
                message: "no such field".to_string(),
            }],
        };
        assert_eq!(err.to_string(), "1 row(s) rejected by bulk upload");
    }
}
