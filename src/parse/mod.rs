//! Measurement line parsing.
//!
//! Task files are newline-delimited JSON, one measurement per line. Each
//! line becomes a row saver carrying the source filename and line number,
//! with a deterministic dedup key so a retried flush of the same data is
//! suppressed by the backend.

use serde_json::Value;

use crate::error_handling::ParseError;
use crate::inserter::MapSaver;

/// Parses one measurement line into a row.
///
/// The line must be a JSON object; the task filename and 1-based line
/// number are added as `task_filename` / `task_line` fields, and the dedup
/// key is `<filename>:<line>`.
pub fn parse_line(filename: &str, line_number: usize, line: &str) -> Result<MapSaver, ParseError> {
    let value: Value = serde_json::from_str(line).map_err(|e| ParseError {
        filename: filename.to_string(),
        line: line_number,
        message: e.to_string(),
    })?;

    let mut fields = match value {
        Value::Object(fields) => fields,
        _ => {
            return Err(ParseError {
                filename: filename.to_string(),
                line: line_number,
                message: "expected a JSON object".to_string(),
            })
        }
    };

    fields.insert("task_filename".to_string(), Value::from(filename));
    fields.insert("task_line".to_string(), Value::from(line_number as u64));

    Ok(MapSaver::with_insert_id(
        fields,
        format!("{}:{}", filename, line_number),
    ))
}

/// True for lines that carry no measurement at all and should be skipped
/// without counting as parse errors.
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inserter::RowSaver;
    use serde_json::json;

    const FILE: &str = "gs://archive/ndt/2026/08/27/task.tgz";

    #[test]
    fn test_parse_line_adds_task_fields() {
        let saver = parse_line(FILE, 3, r#"{"download_mbps": 94.2}"#).expect("valid line");
        let row = saver.save().unwrap();
        assert_eq!(row.fields["download_mbps"], json!(94.2));
        assert_eq!(row.fields["task_filename"], json!(FILE));
        assert_eq!(row.fields["task_line"], json!(3));
    }

    #[test]
    fn test_parse_line_dedup_key_is_deterministic() {
        let first = parse_line(FILE, 7, r#"{"a": 1}"#).unwrap();
        let second = parse_line(FILE, 7, r#"{"a": 1}"#).unwrap();
        assert_eq!(first.insert_id(), second.insert_id());
        assert_eq!(first.insert_id(), format!("{}:7", FILE));
    }

    #[test]
    fn test_parse_line_rejects_invalid_json() {
        let err = parse_line(FILE, 12, "not json").unwrap_err();
        assert_eq!(err.line, 12);
        assert!(err.to_string().contains(FILE));
    }

    #[test]
    fn test_parse_line_rejects_non_objects() {
        assert!(parse_line(FILE, 1, "[1, 2, 3]").is_err());
        assert!(parse_line(FILE, 1, "42").is_err());
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("   \t"));
        assert!(!is_blank(r#"{"a": 1}"#));
    }
}
