//! Payloads returned to callers and stored in the cache.

use serde::{Deserialize, Serialize};

use crate::record::ParsedRecord;

/// Result of parsing one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Seconds the model spent generating (replayed on cache hits).
    pub generation_time: f64,
    pub parsed_query: ParsedRecord,
    /// The trimmed query string.
    pub query: String,
    /// Whether the response was served from cache.
    pub cached: bool,
    /// Total processing time in seconds.
    pub total_time: f64,
    #[serde(default)]
    pub cache_lookup_time: Option<f64>,
}

/// Raw model output for prompt debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugResponse {
    pub query: String,
    pub prompt: String,
    pub raw_llm_output: String,
    /// Cascade stage that would recover a record from the output.
    pub extraction_stage: String,
    pub processing_time: f64,
}

/// Round seconds to `places` decimal places for reporting.
pub(crate) fn round_secs(secs: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (secs * factor).round() / factor
}
