//! Record types flowing through the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Intermediate mapping handed from the parser to the override engine and
/// the normalizer. May carry extra keys until normalized.
pub type RecordMap = Map<String, Value>;

pub const ITEM_TYPE: &str = "item_type";
pub const MATERIAL: &str = "material";
pub const COLOR: &str = "color";

/// The canonical keys, in output order.
pub const FIELDS: [&str; 3] = [ITEM_TYPE, MATERIAL, COLOR];

/// Structured representation of a furniture query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRecord {
    /// The main furniture item type.
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl ParsedRecord {
    pub fn new(
        item_type: Option<&str>,
        material: Option<&str>,
        color: Option<&str>,
    ) -> Self {
        Self {
            item_type: item_type.map(str::to_string),
            material: material.map(str::to_string),
            color: color.map(str::to_string),
        }
    }

    /// True when no field was determined.
    pub fn is_empty(&self) -> bool {
        self.item_type.is_none() && self.material.is_none() && self.color.is_none()
    }

    /// Back to the loose mapping form, with `null` for unset fields.
    pub fn to_map(&self) -> RecordMap {
        let mut map = RecordMap::new();
        for (key, value) in [
            (ITEM_TYPE, &self.item_type),
            (MATERIAL, &self.material),
            (COLOR, &self.color),
        ] {
            let value = value.clone().map(Value::String).unwrap_or(Value::Null);
            map.insert(key.to_string(), value);
        }
        map
    }
}

/// A mapping with all three canonical keys set to `null`.
pub fn empty_map() -> RecordMap {
    ParsedRecord::default().to_map()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_fields_serialize_as_null() {
        let record = ParsedRecord::new(Some("chair"), None, None);
        let json = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["item_type"], "chair");
        assert!(obj["material"].is_null());
        assert!(obj["color"].is_null());
    }

    #[test]
    fn test_empty_map_has_canonical_keys() {
        let map = empty_map();
        assert_eq!(map.len(), 3);
        assert!(FIELDS.iter().all(|f| map[*f].is_null()));
    }
}
