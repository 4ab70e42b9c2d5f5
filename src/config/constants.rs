//! Configuration constants.
//!
//! This module defines all configuration constants used throughout the
//! application: buffer thresholds, timeouts, retry tuning, and the
//! environment variables the production backend is wired from.

/// Default number of rows buffered before a flush is triggered.
/// At roughly 10KB per row, 100 rows is ~1MB per request, an order of
/// magnitude below the backend's request size limit.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Default per-flush request timeout in seconds.
pub const DEFAULT_PUT_TIMEOUT_SECS: u64 = 10;

/// Default number of task files processed concurrently by the worker.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

// Retry strategy (used by the worker around flush; the inserter itself
// never retries internally)
/// Initial delay in milliseconds before the first retry.
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Factor by which the retry delay is multiplied on each attempt.
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 15;
/// Maximum number of retry attempts for the end-of-file flush.
pub const RETRY_MAX_ATTEMPTS: usize = 3;

/// Base URL of the warehouse streaming-insert API.
pub const DEFAULT_WAREHOUSE_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Public HTTPS endpoint used to fetch `gs://` task files.
pub const OBJECT_STORE_ENDPOINT: &str = "https://storage.googleapis.com";

/// Environment variable naming the warehouse project.
pub const PROJECT_ENV: &str = "ETL_PROJECT";
/// Environment variable holding the bearer token for the warehouse API.
pub const ACCESS_TOKEN_ENV: &str = "ETL_ACCESS_TOKEN";
/// Optional environment variable overriding the warehouse endpoint
/// (used to point the worker at an emulator).
pub const ENDPOINT_ENV: &str = "ETL_WAREHOUSE_ENDPOINT";
