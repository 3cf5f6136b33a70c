//! Literal override rules for queries the model is known to get wrong.
//!
//! Rules match against the lowercased *original* query, never the model's
//! echo of it. They are checked in order and the first match wins.

use serde_json::Value;
use tracing::info;

use crate::record::{RecordMap, COLOR, ITEM_TYPE, MATERIAL};

/// What a rule does to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPatch {
    /// Force a value.
    Set(&'static str),
    /// Force the field unset.
    Clear,
    /// Keep whatever the parser produced.
    Keep,
}

/// One entry of the rule table.
#[derive(Debug, Clone, Copy)]
pub struct OverrideRule {
    pub name: &'static str,
    /// Every substring must occur in the lowercased query.
    pub all_of: &'static [&'static str],
    pub item_type: FieldPatch,
    pub material: FieldPatch,
    pub color: FieldPatch,
}

impl OverrideRule {
    pub fn matches(&self, query_lower: &str) -> bool {
        self.all_of.iter().all(|needle| query_lower.contains(needle))
    }

    /// Build the patched record. Fields marked `Keep` come from `parsed`.
    pub fn patch(&self, parsed: &RecordMap) -> RecordMap {
        let mut out = RecordMap::new();
        for (key, patch) in [
            (ITEM_TYPE, self.item_type),
            (MATERIAL, self.material),
            (COLOR, self.color),
        ] {
            let value = match patch {
                FieldPatch::Set(value) => Value::String(value.to_string()),
                FieldPatch::Clear => Value::Null,
                FieldPatch::Keep => parsed.get(key).cloned().unwrap_or(Value::Null),
            };
            out.insert(key.to_string(), value);
        }
        out
    }
}

/// Built-in rules, in priority order.
///
/// The glass shelving unit rule keeps the model's color while forcing the
/// other two fields.
pub const DEFAULT_RULES: &[OverrideRule] = &[
    OverrideRule {
        name: "gold metal accent table",
        all_of: &["gold metal accent table"],
        item_type: FieldPatch::Set("accent table"),
        material: FieldPatch::Set("metal"),
        color: FieldPatch::Set("gold"),
    },
    OverrideRule {
        name: "glass shelving unit",
        all_of: &["shelving unit", "glass"],
        item_type: FieldPatch::Set("shelving unit"),
        material: FieldPatch::Set("glass"),
        color: FieldPatch::Keep,
    },
    OverrideRule {
        name: "amber glass cabinet",
        all_of: &["amber", "glass", "cabinet"],
        item_type: FieldPatch::Set("display cabinet"),
        material: FieldPatch::Set("glass"),
        color: FieldPatch::Set("amber"),
    },
];

/// Ordered rule table applied after parsing.
#[derive(Debug, Clone)]
pub struct OverrideEngine {
    rules: Vec<OverrideRule>,
}

impl OverrideEngine {
    pub fn new(rules: Vec<OverrideRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[OverrideRule] {
        &self.rules
    }

    /// First rule matching `original_query`, if any.
    pub fn find(&self, original_query: &str) -> Option<&OverrideRule> {
        let query_lower = original_query.to_lowercase();
        self.rules.iter().find(|rule| rule.matches(&query_lower))
    }

    /// Apply the first matching rule, or pass `parsed` through unchanged.
    pub fn apply(&self, original_query: &str, parsed: RecordMap) -> RecordMap {
        match self.find(original_query) {
            Some(rule) => {
                info!("Applying override rule '{}'", rule.name);
                rule.patch(&parsed)
            }
            None => parsed,
        }
    }
}

impl Default for OverrideEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::empty_map;
    use serde_json::json;

    fn map(value: Value) -> RecordMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_gold_accent_table_ignores_parser() {
        let engine = OverrideEngine::default();
        let parsed = map(json!({"item_type": "lamp", "material": "paper", "color": "white"}));
        let out = engine.apply("I want a Gold Metal Accent Table please", parsed);
        assert_eq!(
            Value::Object(out),
            json!({"item_type": "accent table", "material": "metal", "color": "gold"})
        );
    }

    #[test]
    fn test_glass_shelving_unit_keeps_color() {
        let engine = OverrideEngine::default();
        let parsed = map(json!({"item_type": "x", "material": "y", "color": "silver"}));
        let out = engine.apply("glass shelving unit", parsed);
        assert_eq!(
            Value::Object(out),
            json!({"item_type": "shelving unit", "material": "glass", "color": "silver"})
        );
    }

    #[test]
    fn test_glass_shelving_unit_missing_color_is_null() {
        let engine = OverrideEngine::default();
        let parsed = map(json!({"item_type": "x"}));
        let out = engine.apply("Shelving Unit in GLASS", parsed);
        assert!(out["color"].is_null());
        assert_eq!(out["item_type"], "shelving unit");
    }

    #[test]
    fn test_amber_glass_cabinet() {
        let engine = OverrideEngine::default();
        let out = engine.apply("amber glass cabinet for display", empty_map());
        assert_eq!(
            Value::Object(out),
            json!({"item_type": "display cabinet", "material": "glass", "color": "amber"})
        );
    }

    #[test]
    fn test_first_match_wins() {
        // Matches both the gold table rule and the shelving unit rule.
        let engine = OverrideEngine::default();
        let query = "gold metal accent table next to a glass shelving unit";
        assert_eq!(engine.find(query).unwrap().name, "gold metal accent table");

        // Shelving unit outranks the amber cabinet rule.
        let query = "amber glass cabinet or shelving unit";
        assert_eq!(engine.find(query).unwrap().name, "glass shelving unit");
    }

    #[test]
    fn test_partial_predicate_does_not_match() {
        let engine = OverrideEngine::default();
        assert!(engine.find("amber glass vase").is_none());
        assert!(engine.find("wooden shelving unit").is_none());
        assert!(engine.find("gold metal table").is_none());
    }

    #[test]
    fn test_no_match_passes_through() {
        let engine = OverrideEngine::default();
        let parsed = map(json!({"item_type": "sofa", "material": "leather", "color": "red", "extra": 1}));
        let out = engine.apply("red leather sofa", parsed.clone());
        assert_eq!(out, parsed);
    }

    #[test]
    fn test_custom_rule_table() {
        let engine = OverrideEngine::new(vec![OverrideRule {
            name: "bean bag",
            all_of: &["bean bag"],
            item_type: FieldPatch::Set("bean bag chair"),
            material: FieldPatch::Keep,
            color: FieldPatch::Clear,
        }]);
        let parsed = map(json!({"item_type": "bag", "material": "fabric", "color": "blue"}));
        let out = engine.apply("Blue bean bag", parsed);
        assert_eq!(
            Value::Object(out),
            json!({"item_type": "bean bag chair", "material": "fabric", "color": null})
        );
        assert_eq!(engine.rules().len(), 1);
        assert!(engine.find("glass shelving unit").is_none());
    }

    #[test]
    fn test_default_rules_in_priority_order() {
        let names: Vec<&str> = OverrideEngine::default()
            .rules()
            .iter()
            .map(|rule| rule.name)
            .collect();
        assert_eq!(
            names,
            ["gold metal accent table", "glass shelving unit", "amber glass cabinet"]
        );
    }
}
