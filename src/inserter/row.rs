//! Row save contract.
//!
//! Records handed to the inserter are opaque; the only thing the inserter
//! ever does with one is ask it to save itself into a field map plus a
//! deduplication key, and that happens at flush time. A record that fails
//! to save is a permanent failure for that record only.

use serde_json::{Map, Value};
use thiserror::Error;

/// A record failed to produce its field map.
///
/// Classified as a permanent per-row failure; the rest of the batch is
/// still attempted.
#[derive(Error, Debug)]
#[error("row encoding failed: {0}")]
pub struct RowEncodeError(pub String);

/// A row in wire-ready form: field map plus deduplication key.
///
/// The dedup key lets the backend suppress duplicate writes when a flush is
/// retried after an ambiguous failure.
#[derive(Debug, Clone)]
pub struct EncodedRow {
    /// Field name to value mapping sent to the backend.
    pub fields: Map<String, Value>,
    /// Deduplication key attached to the row.
    pub insert_id: String,
}

/// The capability every buffered record must provide: produce an
/// [`EncodedRow`] on demand.
///
/// Implementations must be cheap to call more than once; a row that fails a
/// flush retryably will be saved again on the next attempt.
pub trait RowSaver: Send + Sync {
    /// Produces the field map and dedup key for this record.
    fn save(&self) -> Result<EncodedRow, RowEncodeError>;
}

/// A buffered record.
pub type BoxedRow = Box<dyn RowSaver>;

/// Ready-made [`RowSaver`] over an explicit field map.
///
/// When no dedup key is supplied one is generated at construction, so the
/// same key is reused if the row has to be re-sent.
#[derive(Debug, Clone)]
pub struct MapSaver {
    fields: Map<String, Value>,
    insert_id: String,
}

impl MapSaver {
    /// Creates a saver with a generated dedup key.
    pub fn new(fields: Map<String, Value>) -> Self {
        MapSaver {
            fields,
            insert_id: generate_insert_id(),
        }
    }

    /// Creates a saver with an explicit dedup key.
    pub fn with_insert_id(fields: Map<String, Value>, insert_id: impl Into<String>) -> Self {
        MapSaver {
            fields,
            insert_id: insert_id.into(),
        }
    }

    /// Builds a saver from any serializable struct.
    ///
    /// The value must serialize to a JSON object; anything else (arrays,
    /// scalars, unserializable field values) is a [`RowEncodeError`].
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Self, RowEncodeError> {
        let value = serde_json::to_value(value).map_err(|e| RowEncodeError(e.to_string()))?;
        match value {
            Value::Object(fields) => Ok(MapSaver::new(fields)),
            other => Err(RowEncodeError(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// The dedup key this saver will attach to its row.
    pub fn insert_id(&self) -> &str {
        &self.insert_id
    }
}

impl RowSaver for MapSaver {
    fn save(&self) -> Result<EncodedRow, RowEncodeError> {
        Ok(EncodedRow {
            fields: self.fields.clone(),
            insert_id: self.insert_id.clone(),
        })
    }
}

/// Generates a random per-row dedup key, the same convention the backend's
/// own client libraries use for streaming inserts.
fn generate_insert_id() -> String {
    use rand::Rng;
    format!("{:016x}", rand::rng().random::<u64>())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[test]
    fn test_map_saver_roundtrip() {
        let mut fields = Map::new();
        fields.insert("filename".to_string(), json!("foobar"));
        let saver = MapSaver::new(fields);

        let row = saver.save().expect("save should succeed");
        assert_eq!(row.fields["filename"], json!("foobar"));
        assert!(!row.insert_id.is_empty());
    }

    #[test]
    fn test_map_saver_stable_insert_id() {
        let saver = MapSaver::new(Map::new());
        let first = saver.save().unwrap().insert_id;
        let second = saver.save().unwrap().insert_id;
        // The dedup key must survive re-saving, or retries would defeat
        // backend deduplication.
        assert_eq!(first, second);
    }

    #[test]
    fn test_map_saver_explicit_insert_id() {
        let saver = MapSaver::with_insert_id(Map::new(), "task.tgz:42");
        assert_eq!(saver.save().unwrap().insert_id, "task.tgz:42");
    }

    #[test]
    fn test_from_serialize_struct() {
        #[derive(Serialize)]
        struct Item {
            name: String,
            count: i64,
        }
        let saver = MapSaver::from_serialize(&Item {
            name: "x0".to_string(),
            count: 17,
        })
        .expect("struct should serialize");
        let row = saver.save().unwrap();
        assert_eq!(row.fields["name"], json!("x0"));
        assert_eq!(row.fields["count"], json!(17));
    }

    #[test]
    fn test_from_serialize_rejects_non_objects() {
        let err = MapSaver::from_serialize(&vec![1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("array"));
    }
}
