//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (buffer thresholds, timeouts, endpoints)
//! - The immutable [`InserterParams`] handed to each batch inserter
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{Config, InserterParams, LogFormat, LogLevel};
