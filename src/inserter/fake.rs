//! Deterministic in-memory upload backend.
//!
//! The counterpart to [`StreamingUploader`](super::StreamingUploader),
//! selected at wiring time: unit tests and the worker's `--dry-run` mode
//! construct an inserter over a `FakeUploader` instead of the production
//! backend. Every call is recorded, and a scripted queue of outcomes lets a
//! test simulate fatal errors, partial errors with specific row indices, or
//! success, with no network access.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error_handling::UploadError;

use super::row::EncodedRow;
use super::uploader::Uploader;

#[derive(Default)]
struct FakeState {
    calls: Mutex<Vec<Vec<EncodedRow>>>,
    script: Mutex<VecDeque<UploadError>>,
}

/// Recording upload backend with scripted outcomes.
///
/// Cloning is cheap and shares state, so a test can keep a handle to the
/// fake after boxing a clone into the inserter.
#[derive(Clone, Default)]
pub struct FakeUploader {
    inner: Arc<FakeState>,
}

impl FakeUploader {
    /// Creates a fake that succeeds on every call until told otherwise.
    pub fn new() -> Self {
        FakeUploader::default()
    }

    /// Queues an error outcome; outcomes are consumed in order, one per
    /// `put` call. With an empty queue every call succeeds.
    pub fn fail_next(&self, err: UploadError) {
        self.inner
            .script
            .lock()
            .expect("fake uploader lock poisoned")
            .push_back(err);
    }

    /// Number of `put` calls made so far, including failed ones.
    pub fn call_count(&self) -> usize {
        self.inner
            .calls
            .lock()
            .expect("fake uploader lock poisoned")
            .len()
    }

    /// Total rows across all recorded calls.
    pub fn total_rows(&self) -> usize {
        self.inner
            .calls
            .lock()
            .expect("fake uploader lock poisoned")
            .iter()
            .map(|c| c.len())
            .sum()
    }

    /// Snapshot of every recorded call's rows.
    pub fn calls(&self) -> Vec<Vec<EncodedRow>> {
        self.inner
            .calls
            .lock()
            .expect("fake uploader lock poisoned")
            .clone()
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn put(&self, rows: Vec<EncodedRow>, _timeout: Duration) -> Result<usize, UploadError> {
        let count = rows.len();
        self.inner
            .calls
            .lock()
            .expect("fake uploader lock poisoned")
            .push(rows);
        let scripted = self
            .inner
            .script
            .lock()
            .expect("fake uploader lock poisoned")
            .pop_front();
        match scripted {
            Some(err) => Err(err),
            None => Ok(count),
        }
    }
}
