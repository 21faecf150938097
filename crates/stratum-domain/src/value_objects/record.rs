//! Lean record normalization
//!
//! Storage engines disagree about identifier fields and timestamp encodings.
//! [`LeanRecord`] is the canonical shape every adapter's `to_lean` produces:
//! a string `id` plus real `created_at`/`updated_at` datetimes, regardless of
//! what the engine stored natively.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names an engine uses in its native record shape
///
/// Adapters declare their shape once; normalization maps from it.
#[derive(Debug, Clone, Copy)]
pub struct NativeShape {
    /// Native identifier field (e.g. `_id`, `id`)
    pub id: &'static str,
    /// Native creation timestamp field
    pub created_at: &'static str,
    /// Native update timestamp field
    pub updated_at: &'static str,
}

/// Canonical entity shape guaranteed by every adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeanRecord {
    /// String identifier, mapped from the engine's native id field
    pub id: String,
    /// Creation time, coerced from the engine's native encoding
    pub created_at: DateTime<Utc>,
    /// Last update time, coerced from the engine's native encoding
    pub updated_at: DateTime<Utc>,
    /// Remaining entity fields, untouched
    pub fields: Map<String, Value>,
}

impl LeanRecord {
    /// Normalize an engine-native record
    ///
    /// The native id field is mapped to string `id` (numbers are stringified,
    /// a literal `id` field is the fallback). Timestamps accept RFC 3339
    /// strings or epoch-millisecond numbers and default to now when absent.
    /// The shape's bookkeeping fields are stripped from `fields`.
    pub fn from_native(raw: Value, shape: NativeShape) -> Self {
        let mut object = match raw {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        let id = object
            .remove(shape.id)
            .or_else(|| object.remove("id"))
            .map(|v| coerce_id(&v))
            .unwrap_or_default();
        let created_at = coerce_timestamp(object.remove(shape.created_at).as_ref());
        let updated_at = coerce_timestamp(object.remove(shape.updated_at).as_ref());

        Self {
            id,
            created_at,
            updated_at,
            fields: object,
        }
    }

    /// Read a remaining entity field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

fn coerce_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Coerce a native timestamp value to a datetime
///
/// Strings are RFC 3339; numbers are epoch milliseconds. Anything else,
/// including absence, falls back to the current time.
pub fn coerce_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        Some(Value::Number(n)) => {
            if let Some(millis) = n.as_i64() {
                Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
            } else {
                Utc::now()
            }
        }
        _ => Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOC_SHAPE: NativeShape = NativeShape {
        id: "_id",
        created_at: "createdAt",
        updated_at: "updatedAt",
    };

    const ROW_SHAPE: NativeShape = NativeShape {
        id: "id",
        created_at: "created_at",
        updated_at: "updated_at",
    };

    #[test]
    fn maps_document_native_shape() {
        let raw = json!({
            "_id": "abc-123",
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-02T11:30:00Z",
            "title": "hello",
        });
        let lean = LeanRecord::from_native(raw, DOC_SHAPE);
        assert_eq!(lean.id, "abc-123");
        assert_eq!(lean.created_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");
        assert_eq!(lean.field("title"), Some(&json!("hello")));
        assert!(lean.field("_id").is_none());
        assert!(lean.field("createdAt").is_none());
    }

    #[test]
    fn stringifies_numeric_ids() {
        let raw = json!({"id": 42, "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"});
        let lean = LeanRecord::from_native(raw, ROW_SHAPE);
        assert_eq!(lean.id, "42");
    }

    #[test]
    fn coerces_epoch_millis() {
        let raw = json!({"_id": "x", "createdAt": 1_700_000_000_000i64, "updatedAt": 1_700_000_000_000i64});
        let lean = LeanRecord::from_native(raw, DOC_SHAPE);
        assert_eq!(lean.created_at.timestamp_millis(), 1_700_000_000_000i64);
    }

    #[test]
    fn missing_timestamps_default_to_now() {
        let before = Utc::now();
        let lean = LeanRecord::from_native(json!({"_id": "x"}), DOC_SHAPE);
        assert!(lean.created_at >= before);
        assert!(lean.updated_at >= before);
    }

    #[test]
    fn falls_back_to_literal_id_field() {
        let raw = json!({"id": "fallback", "createdAt": 0, "updatedAt": 0});
        let lean = LeanRecord::from_native(raw, DOC_SHAPE);
        assert_eq!(lean.id, "fallback");
    }
}
