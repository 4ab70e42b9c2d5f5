//! Bulk upload port.
//!
//! The inserter core never talks to the network directly; it hands each
//! batch to an [`Uploader`] and interprets the outcome. Two implementations
//! exist: the production streaming backend
//! ([`StreamingUploader`](super::StreamingUploader)) and the deterministic
//! [`FakeUploader`](super::FakeUploader) used in tests and dry runs.

use std::time::Duration;

use async_trait::async_trait;

use crate::error_handling::UploadError;

use super::row::EncodedRow;

/// Capability to insert a batch of rows into the destination table.
///
/// Contract:
/// - `rows` is non-empty and at most the caller's buffer threshold long.
/// - Success returns the number of rows durably accepted, which must equal
///   `rows.len()`.
/// - A partial failure returns [`UploadError::Partial`] enumerating the
///   rejected row indices, each cause already tagged retryable or permanent.
/// - A whole-batch failure (connectivity, auth, timeout) returns
///   [`UploadError::Fatal`].
/// - Implementations never retry internally; retry policy belongs to the
///   caller.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Writes one batch, blocking until the backend answers or `timeout`
    /// expires.
    async fn put(&self, rows: Vec<EncodedRow>, timeout: Duration) -> Result<usize, UploadError>;
}
