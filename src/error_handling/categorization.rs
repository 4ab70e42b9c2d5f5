//! Error categorization and retry strategy.
//!
//! This module maps transport- and backend-level error shapes onto the
//! generic taxonomy in [`types`](super::types), and configures the retry
//! strategy used by callers around `flush`. The inserter itself never
//! retries internally; retryable rows simply stay buffered.

use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

use super::types::{FailureKind, FatalKind};

/// Creates an exponential backoff retry strategy for flush attempts.
///
/// Configured from the constants in [`crate::config`]:
/// - Initial delay: `RETRY_INITIAL_DELAY_MS` milliseconds
/// - Backoff factor: `RETRY_FACTOR` (doubles delay each retry)
/// - Maximum delay: `RETRY_MAX_DELAY_SECS` seconds
/// - Maximum attempts: `RETRY_MAX_ATTEMPTS`
///
/// Used by the worker around the end-of-file flush; the batch inserter
/// deliberately has no retry loop of its own.
pub fn get_retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(crate::config::RETRY_INITIAL_DELAY_MS)
        .factor(crate::config::RETRY_FACTOR)
        .max_delay(Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS))
        .take(crate::config::RETRY_MAX_ATTEMPTS)
}

/// Categorizes a `reqwest::Error` into a [`FatalKind`].
///
/// Transport failures reject the whole batch, so every shape a `reqwest`
/// call can fail with maps to a fatal category here. HTTP status codes are
/// checked first, then the error's transport classification.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> FatalKind {
    if let Some(status) = error.status() {
        return categorize_status(status.as_u16());
    }

    if error.is_timeout() {
        FatalKind::Timeout
    } else if error.is_connect() {
        FatalKind::Connect
    } else if error.is_builder() || error.is_request() {
        FatalKind::InvalidRequest
    } else {
        FatalKind::Other
    }
}

/// Categorizes an HTTP status code into a [`FatalKind`].
pub fn categorize_status(status: u16) -> FatalKind {
    match status {
        401 | 403 => FatalKind::Auth,
        400 | 404 | 413 => FatalKind::InvalidRequest,
        408 => FatalKind::Timeout,
        _ if (500..600).contains(&status) => FatalKind::Backend,
        _ => FatalKind::Other,
    }
}

/// Classifies a backend per-row reason code as retryable or permanent.
///
/// The reason codes follow the warehouse streaming-insert API: `invalid`
/// and friends mean the row's data will never be accepted; availability
/// and quota reasons clear up on their own. Unknown reasons classify as
/// retryable so that no row is ever silently dropped on a reason code this
/// table has not seen.
pub fn classify_insert_reason(reason: &str) -> FailureKind {
    match reason {
        "invalid" | "invalidQuery" | "notFound" | "schemaMismatch" | "stopped" => {
            FailureKind::Permanent
        }
        "backendError" | "internalError" | "timeout" | "rateLimitExceeded" | "quotaExceeded"
        | "resourcesExceeded" | "tableUnavailable" => FailureKind::Retryable,
        other => {
            log::warn!("Unknown insert error reason {:?}, treating as retryable", other);
            FailureKind::Retryable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_get_retry_strategy_max_attempts() {
        let strategy = get_retry_strategy();
        assert_eq!(strategy.count(), crate::config::RETRY_MAX_ATTEMPTS);
    }

    #[test]
    fn test_get_retry_strategy_delays_increase() {
        let delays: Vec<Duration> = get_retry_strategy().collect();
        for i in 1..delays.len() {
            assert!(
                delays[i] >= delays[i - 1],
                "Delay should not decrease: {:?} -> {:?}",
                delays[i - 1],
                delays[i]
            );
        }
    }

    #[test]
    fn test_categorize_status() {
        assert_eq!(categorize_status(401), FatalKind::Auth);
        assert_eq!(categorize_status(403), FatalKind::Auth);
        assert_eq!(categorize_status(400), FatalKind::InvalidRequest);
        assert_eq!(categorize_status(404), FatalKind::InvalidRequest);
        assert_eq!(categorize_status(408), FatalKind::Timeout);
        assert_eq!(categorize_status(500), FatalKind::Backend);
        assert_eq!(categorize_status(503), FatalKind::Backend);
        assert_eq!(categorize_status(418), FatalKind::Other);
    }

    #[test]
    fn test_classify_insert_reason_permanent() {
        assert_eq!(classify_insert_reason("invalid"), FailureKind::Permanent);
        assert_eq!(
            classify_insert_reason("schemaMismatch"),
            FailureKind::Permanent
        );
        assert_eq!(classify_insert_reason("notFound"), FailureKind::Permanent);
    }

    #[test]
    fn test_classify_insert_reason_retryable() {
        assert_eq!(
            classify_insert_reason("backendError"),
            FailureKind::Retryable
        );
        assert_eq!(classify_insert_reason("timeout"), FailureKind::Retryable);
        assert_eq!(
            classify_insert_reason("rateLimitExceeded"),
            FailureKind::Retryable
        );
        assert_eq!(
            classify_insert_reason("quotaExceeded"),
            FailureKind::Retryable
        );
    }

    #[test]
    fn test_classify_insert_reason_unknown_is_retryable() {
        // An unrecognized reason must never cause a silent drop.
        assert_eq!(
            classify_insert_reason("somethingNew"),
            FailureKind::Retryable
        );
    }

    // Note: categorize_reqwest_error with real reqwest::Error instances needs
    // an actual HTTP exchange; that path is covered by the httptest-backed
    // uploader tests in src/inserter/bigquery.rs.
}
