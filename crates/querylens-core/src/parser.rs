//! Recovery of a record from free-form model output.
//!
//! Small models rarely answer with clean JSON. They wrap it in prose, use
//! single quotes or forget to quote keys. [`parse`] runs an ordered cascade
//! of extractors, strictest first, and stops at the first one that yields a
//! JSON object. When every extractor fails the all-`null` record is
//! returned, so parsing itself never fails.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, error, warn};

use crate::normalize::coerce_value;
use crate::record::{empty_map, RecordMap, FIELDS};

/// Which step of the cascade produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    /// The whole text was a JSON object.
    Strict,
    /// The first `{...}` span was a JSON object.
    BracketScan,
    /// The first `{...}` span parsed after quote and key repair.
    Repaired,
    /// Nothing parsed; all fields unset.
    Fallback,
}

impl ExtractionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStage::Strict => "strict",
            ExtractionStage::BracketScan => "bracket_scan",
            ExtractionStage::Repaired => "repaired",
            ExtractionStage::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Extractor = fn(&str) -> Option<RecordMap>;

const CASCADE: &[(ExtractionStage, Extractor)] = &[
    (ExtractionStage::Strict, parse_whole),
    (ExtractionStage::BracketScan, scan_first_object),
    (ExtractionStage::Repaired, repair_and_scan),
];

/// Parse model output into a mapping holding exactly the canonical keys.
pub fn parse(text: &str) -> RecordMap {
    parse_traced(text).1
}

/// Like [`parse`], also reporting which stage succeeded.
pub fn parse_traced(text: &str) -> (ExtractionStage, RecordMap) {
    debug!("Parsing model response text of length {}", text.len());

    if text.trim().is_empty() {
        warn!("Model response is empty, returning empty record");
        return (ExtractionStage::Fallback, empty_map());
    }

    let found = CASCADE.iter().find_map(|(stage, extract)| {
        debug!("Attempting {} extraction", stage);
        match extract(text) {
            Some(map) => Some((*stage, map)),
            None => {
                warn!("{} extraction failed", stage);
                None
            }
        }
    });

    match found {
        Some((stage, map)) => {
            debug!("Extracted record using {} stage", stage);
            (stage, canonicalize(map))
        }
        None => {
            error!("All JSON parsing methods failed, returning empty record");
            (ExtractionStage::Fallback, empty_map())
        }
    }
}

/// Keep only the canonical keys, adding missing ones as `null`. Values
/// end up as strings or `null`.
fn canonicalize(mut map: RecordMap) -> RecordMap {
    FIELDS
        .iter()
        .map(|field| {
            let value = map.remove(*field).unwrap_or(Value::Null);
            (field.to_string(), coerce_value(field, value))
        })
        .collect()
}

/// Decode `text` as JSON, accepting only objects.
fn decode_object(text: &str) -> Option<RecordMap> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            debug!("Decoded JSON is not an object: {}", json_kind(&other));
            None
        }
        Err(e) => {
            debug!("JSON decode error: {}", e);
            None
        }
    }
}

fn parse_whole(text: &str) -> Option<RecordMap> {
    decode_object(text)
}

/// Decode the span from the first `{` to the nearest following `}`.
fn scan_first_object(text: &str) -> Option<RecordMap> {
    let span = object_span().find(text)?;
    debug!("Found potential JSON: {}", span.as_str());
    decode_object(span.as_str())
}

fn repair_and_scan(text: &str) -> Option<RecordMap> {
    scan_first_object(&repair(text))
}

/// Swap single quotes for double quotes and quote bare identifier keys.
pub(crate) fn repair(text: &str) -> String {
    let requoted = text.replace('\'', "\"");
    bare_key()
        .replace_all(&requoted, "${1}\"${2}\":")
        .into_owned()
}

fn object_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*?\}").expect("object span pattern is valid"))
}

fn bare_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([{,]\s*)([a-zA-Z0-9_]+)\s*:").expect("bare key pattern is valid")
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
