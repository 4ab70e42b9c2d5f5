//! Error handling and classification.
//!
//! This module provides:
//! - Error type definitions for every layer (initialization, upload port,
//!   inserter surface, task/parse pipeline)
//! - Categorization of transport errors and backend reason codes
//! - Retry strategy configuration for callers of `flush`
//!
//! The taxonomy (spelled out in the type docs):
//! - **Fatal**: the whole batch failed; buffer untouched, caller retries
//! - **Permanent per-row**: dropped after being counted, never retried
//! - **Retryable per-row**: requeued, retried on the next flush

mod categorization;
mod types;

// Re-export public API
pub use categorization::{
    categorize_reqwest_error, categorize_status, classify_insert_reason, get_retry_strategy,
};
pub use types::{
    FailureKind, FatalError, FatalKind, InitializationError, InsertError, ParseError,
    PartialInsertError, RowFailure, TaskError, UploadError,
};
