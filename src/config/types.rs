//! Configuration types and CLI options.
//!
//! This module defines the immutable inserter parameters, the worker
//! configuration struct, and the enums used for command-line parsing.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::constants::{
    DEFAULT_BUFFER_SIZE, DEFAULT_MAX_CONCURRENCY, DEFAULT_PUT_TIMEOUT_SECS,
};

/// Logging level for the application.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Immutable configuration for one batch inserter.
///
/// Set once at construction and never mutated; every destination table gets
/// its own inserter instance with its own buffer and counters.
#[derive(Debug, Clone)]
pub struct InserterParams {
    /// Target dataset identifier.
    pub dataset: String,
    /// Target table identifier.
    pub table: String,
    /// Optional partition suffix appended to the table name (e.g. "_20260827").
    pub suffix: Option<String>,
    /// Per-flush request timeout.
    pub put_timeout: Duration,
    /// Number of buffered rows that triggers an automatic flush.
    pub buffer_size: usize,
}

impl InserterParams {
    /// Parameters with default threshold and timeout for one table.
    pub fn new(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        InserterParams {
            dataset: dataset.into(),
            table: table.into(),
            suffix: None,
            put_timeout: Duration::from_secs(DEFAULT_PUT_TIMEOUT_SECS),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Sets the partition suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Sets the per-flush timeout.
    pub fn with_put_timeout(mut self, timeout: Duration) -> Self {
        self.put_timeout = timeout;
        self
    }

    /// Sets the buffer threshold.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// The fully qualified table name including any partition suffix.
    pub fn table_with_suffix(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}{}", self.table, suffix),
            None => self.table.clone(),
        }
    }
}

/// Worker configuration, parsed from the command line.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "measurement_etl",
    about = "Parses measurement task files and streams rows into a warehouse table in batches."
)]
pub struct Config {
    /// Task filenames: gs:// paths, base64-encoded gs:// paths, http(s)
    /// URLs, or local file paths
    #[arg(required = true)]
    pub filenames: Vec<String>,

    /// Target dataset
    #[arg(long, default_value = "measurements")]
    pub dataset: String,

    /// Number of rows buffered before an automatic flush
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    /// Per-flush request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_PUT_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// Maximum number of task files processed concurrently
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Record rows in memory instead of writing to the warehouse
    #[arg(long)]
    pub dry_run: bool,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}
