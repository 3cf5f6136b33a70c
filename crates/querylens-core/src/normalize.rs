//! Conversion of the loose mapping into a [`ParsedRecord`].

use serde_json::Value;
use tracing::debug;

use crate::record::{ParsedRecord, RecordMap, COLOR, ITEM_TYPE, MATERIAL};

/// Fill absent fields with `None` and drop keys outside the canonical three.
///
/// Strings are kept as-is, numbers and booleans become their JSON text, and
/// arrays or objects are treated as unset.
pub fn normalize(record: &RecordMap) -> ParsedRecord {
    ParsedRecord {
        item_type: field(record, ITEM_TYPE),
        material: field(record, MATERIAL),
        color: field(record, COLOR),
    }
}

fn field(record: &RecordMap, key: &str) -> Option<String> {
    match coerce_value(key, record.get(key)?.clone()) {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Reduce a model-supplied value to a string or `null`.
pub(crate) fn coerce_value(key: &str, value: Value) -> Value {
    match value {
        Value::Null | Value::String(_) => value,
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => {
            debug!("Discarding non-scalar value for {}: {}", key, other);
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn map(value: Value) -> RecordMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_fields_become_none() {
        let record = normalize(&map(json!({"item_type": "chair"})));
        assert_eq!(record, ParsedRecord::new(Some("chair"), None, None));
    }

    #[test]
    fn test_extra_keys_dropped() {
        let record = normalize(&map(json!({
            "item_type": "desk",
            "material": "oak",
            "color": "brown",
            "confidence": 0.9
        })));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, json!({"item_type": "desk", "material": "oak", "color": "brown"}));
    }

    #[test]
    fn test_value_kinds() {
        let record = normalize(&map(json!({
            "item_type": ["chair", "stool"],
            "material": 3,
            "color": false
        })));
        assert_eq!(record.item_type, None);
        assert_eq!(record.material.as_deref(), Some("3"));
        assert_eq!(record.color.as_deref(), Some("false"));
    }

    #[test]
    fn test_unparseable_text_normalizes_to_empty() {
        let record = normalize(&parse("no structure here at all"));
        assert!(record.is_empty());
    }

    #[test]
    fn test_noise_then_normalize() {
        let record = normalize(&parse(r#"noise noise {"item_type": "chair"} trailing noise"#));
        assert_eq!(record, ParsedRecord::new(Some("chair"), None, None));
    }
}
