//! Keyword classifier that needs no model.
//!
//! Used by the `/test` endpoint and `querylens parse --keywords` to check the
//! plumbing without loading weights. Each table is scanned in order and the
//! first entry with a matching keyword wins.

use crate::record::ParsedRecord;

type KeywordTable = &'static [(&'static str, &'static [&'static str])];

const ITEM_TYPES: KeywordTable = &[
    ("table", &["table"]),
    ("chair", &["chair"]),
    ("sofa", &["sofa", "couch"]),
    ("bookshelf", &["bookshelf", "shelf"]),
    ("bed", &["bed"]),
    ("desk", &["desk"]),
    ("dresser", &["dresser", "drawer"]),
];

const MATERIALS: KeywordTable = &[
    ("wooden", &["wood", "wooden"]),
    ("metal", &["metal", "steel", "iron"]),
    ("plastic", &["plastic"]),
    ("leather", &["leather"]),
    ("fabric", &["fabric", "cloth"]),
    ("glass", &["glass"]),
];

const COLORS: KeywordTable = &[
    ("blue", &["blue"]),
    ("red", &["red"]),
    ("green", &["green"]),
    ("yellow", &["yellow"]),
    ("black", &["black"]),
    ("white", &["white"]),
    ("brown", &["brown"]),
    ("gray", &["gray", "grey"]),
];

const FALLBACK_ITEM_TYPE: &str = "furniture";

fn lookup(table: KeywordTable, query_lower: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| query_lower.contains(k)))
        .map(|(label, _)| *label)
}

/// Classify `query` by keyword. `item_type` is always set.
pub fn classify(query: &str) -> ParsedRecord {
    let query_lower = query.to_lowercase();

    let item_type = match lookup(ITEM_TYPES, &query_lower) {
        Some("table") if query_lower.contains("dining") => "dining table",
        Some(label) => label,
        None => FALLBACK_ITEM_TYPE,
    };

    ParsedRecord::new(
        Some(item_type),
        lookup(MATERIALS, &query_lower),
        lookup(COLORS, &query_lower),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dining_table() {
        assert_eq!(
            classify("Blue wooden dining table"),
            ParsedRecord::new(Some("dining table"), Some("wooden"), Some("blue"))
        );
    }

    #[test]
    fn test_synonyms() {
        assert_eq!(
            classify("grey steel couch"),
            ParsedRecord::new(Some("sofa"), Some("metal"), Some("gray"))
        );
        assert_eq!(
            classify("cloth chest of drawers"),
            ParsedRecord::new(Some("dresser"), Some("fabric"), None)
        );
    }

    #[test]
    fn test_table_order_decides() {
        // "table" is checked before "chair".
        assert_eq!(classify("chair and table set").item_type.as_deref(), Some("table"));
        // "wood" is checked before "glass".
        assert_eq!(
            classify("wooden bookshelf with glass doors").material.as_deref(),
            Some("wooden")
        );
    }

    #[test]
    fn test_unknown_query() {
        assert_eq!(
            classify("something nice"),
            ParsedRecord::new(Some("furniture"), None, None)
        );
    }
}
