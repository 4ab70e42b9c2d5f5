//! Task filename handling.
//!
//! Task queues deliver filenames either as bare `gs://` paths or base64
//! encoded; [`decode_filename`] normalizes them. The archive path encodes
//! both the measurement type and the date of the data, which determine the
//! destination table and its partition suffix.

use base64::Engine;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use strum_macros::{Display as DisplayMacro, EnumIter as EnumIterMacro};

use crate::error_handling::TaskError;

/// Archive layout: `gs://<bucket>/<experiment>/<yyyy>/<mm>/<dd>/<name>.tgz`.
static TASK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^gs://([^/]+)/([^/]+)/(\d{4})/(\d{2})/(\d{2})/([^/]+)\.(tgz|tar|tar\.gz)$")
        .expect("task pattern is valid")
});

/// The measurement types this worker knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DisplayMacro, EnumIterMacro)]
pub enum DataType {
    /// Network diagnostic test results.
    Ndt,
    /// Sidestream TCP statistics.
    Sidestream,
    /// Paris-traceroute path measurements.
    ParisTraceroute,
    /// Switch telemetry (disco).
    Switch,
}

impl DataType {
    /// Derives the measurement type from a normalized `gs://` task path.
    pub fn from_filename(filename: &str) -> Option<DataType> {
        let fields = TASK_PATTERN.captures(filename)?;
        match &fields[2] {
            "ndt" => Some(DataType::Ndt),
            "sidestream" => Some(DataType::Sidestream),
            "paris-traceroute" => Some(DataType::ParisTraceroute),
            "switch" => Some(DataType::Switch),
            _ => None,
        }
    }

    /// The destination table for this measurement type.
    pub fn table(&self) -> &'static str {
        match self {
            DataType::Ndt => "ndt_test",
            DataType::Sidestream => "ss_test",
            DataType::ParisTraceroute => "pt_test",
            DataType::Switch => "disco_test",
        }
    }
}

/// Normalizes a task filename.
///
/// Accepts a bare `gs://` path or a base64 encoding of one (the task queue
/// sends both forms); anything else is an invalid filename.
pub fn decode_filename(raw: &str) -> Result<String, TaskError> {
    if raw.starts_with("gs://") {
        return Ok(raw.to_string());
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(raw)
        .map_err(|_| TaskError::InvalidFilename(raw.to_string()))?;
    let filename =
        String::from_utf8(decoded).map_err(|_| TaskError::InvalidFilename(raw.to_string()))?;
    if filename.starts_with("gs://") {
        Ok(filename)
    } else {
        Err(TaskError::InvalidFilename(filename))
    }
}

/// Extracts the archive date from a normalized task path and renders it as
/// a `_YYYYMMDD` partition suffix.
pub fn partition_suffix(filename: &str) -> Option<String> {
    let fields = TASK_PATTERN.captures(filename)?;
    let year: i32 = fields[3].parse().ok()?;
    let month: u32 = fields[4].parse().ok()?;
    let day: u32 = fields[5].parse().ok()?;
    // Rejects out-of-range dates like month 13.
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.format("_%Y%m%d").to_string())
}
