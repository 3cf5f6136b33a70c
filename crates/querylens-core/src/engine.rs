//! Query engine - cache-fronted model inference.

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cache::QueryCache;
use crate::config::EngineConfig;
use crate::keywords;
use crate::model::{ModelError, SharedModel, TextGenerator};
use crate::normalize::normalize;
use crate::overrides::OverrideEngine;
use crate::parser;
use crate::prompt::build_prompt;
use crate::response::{round_secs, DebugResponse, QueryResponse};

/// Generation time reported by the keyword classifier.
const KEYWORD_GENERATION_TIME: f64 = 0.01;

/// Errors from the query engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The query was empty after trimming.
    #[error("Query cannot be empty")]
    EmptyQuery,
    #[error("Failed to initialize language model: {0}")]
    ModelInit(#[source] ModelError),
    #[error("Error processing query: {0}")]
    Generation(#[source] ModelError),
}

impl EngineError {
    /// True when the caller sent bad input rather than the server failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::EmptyQuery)
    }
}

/// Turns queries into records: cache first, then the model.
pub struct QueryEngine {
    config: EngineConfig,
    model: SharedModel,
    cache: Arc<dyn QueryCache>,
    overrides: OverrideEngine,
}

impl QueryEngine {
    /// Build the engine described by `config`. The model loads on first use.
    pub fn new(config: EngineConfig) -> Self {
        let model = config.model();
        let cache = config.cache.build();
        Self::with_parts(config, model, cache)
    }

    /// Build an engine around an explicit model handle and cache.
    pub fn with_parts(config: EngineConfig, model: SharedModel, cache: Arc<dyn QueryCache>) -> Self {
        Self {
            config,
            model,
            cache,
            overrides: OverrideEngine::default(),
        }
    }

    /// Replace the override rule table.
    pub fn with_overrides(mut self, overrides: OverrideEngine) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_loaded()
    }

    /// Load the model now instead of on the first request.
    pub async fn preload(&self) -> Result<(), EngineError> {
        self.load_model().await.map(|_| ())
    }

    /// Parse a query into a record.
    ///
    /// One cache read per call; on a miss, one model call and one cache
    /// write. A failed model call is not retried and nothing is cached.
    pub async fn handle(&self, query: &str) -> Result<QueryResponse, EngineError> {
        let start = Instant::now();
        let query = validate(query)?;

        info!("Processing query: '{}'", query);

        let lookup_start = Instant::now();
        let cached = self.cache.get(query);
        let cache_lookup_time = lookup_start.elapsed();

        if let Some(hit) = cached {
            debug!("Replaying cached response for '{}'", query);
            return Ok(QueryResponse {
                generation_time: hit.generation_time,
                parsed_query: hit.parsed_query,
                query: query.to_string(),
                cached: true,
                total_time: round_secs(start.elapsed().as_secs_f64(), 4),
                cache_lookup_time: Some(round_secs(cache_lookup_time.as_secs_f64(), 4)),
            });
        }

        let model = self.load_model().await?;
        let (raw, generation_time) = self.generate(model.as_ref(), query).await?;
        info!(
            "Model generation completed in {:.2} seconds",
            generation_time.as_secs_f64()
        );

        let parsed = parser::parse(&raw);
        debug!("Parsed data before override rules: {:?}", parsed);
        let record = normalize(&self.overrides.apply(query, parsed));
        info!("Final query parsing result: {:?}", record);

        let response = QueryResponse {
            generation_time: round_secs(generation_time.as_secs_f64(), 2),
            parsed_query: record,
            query: query.to_string(),
            cached: false,
            total_time: round_secs(start.elapsed().as_secs_f64(), 4),
            cache_lookup_time: Some(round_secs(cache_lookup_time.as_secs_f64(), 4)),
        };

        if !self.cache.set(query, &response, self.config.cache_expiry) {
            debug!("Response for '{}' was not cached", query);
        }

        Ok(response)
    }

    /// Keyword classification without the model or the cache.
    pub fn classify(&self, query: &str) -> Result<QueryResponse, EngineError> {
        let start = Instant::now();
        let query = validate(query)?;
        info!("Keyword classification for: '{}'", query);

        let record = keywords::classify(query);

        Ok(QueryResponse {
            generation_time: KEYWORD_GENERATION_TIME,
            parsed_query: record,
            query: query.to_string(),
            cached: false,
            total_time: round_secs(start.elapsed().as_secs_f64(), 4),
            cache_lookup_time: None,
        })
    }

    /// Raw model output for a query, bypassing the cache.
    pub async fn debug(&self, query: &str) -> Result<DebugResponse, EngineError> {
        let start = Instant::now();
        let query = validate(query)?;
        info!("Debug mode: processing query: '{}'", query);

        let model = self.load_model().await?;
        let (raw, _) = self.generate(model.as_ref(), query).await?;
        let (stage, _) = parser::parse_traced(&raw);

        Ok(DebugResponse {
            query: query.to_string(),
            prompt: build_prompt(query),
            raw_llm_output: raw,
            extraction_stage: stage.to_string(),
            processing_time: start.elapsed().as_secs_f64(),
        })
    }

    async fn load_model(&self) -> Result<Arc<dyn TextGenerator>, EngineError> {
        self.model.get().await.map_err(EngineError::ModelInit)
    }

    async fn generate(
        &self,
        model: &dyn TextGenerator,
        query: &str,
    ) -> Result<(String, Duration), EngineError> {
        let prompt = build_prompt(query);
        let start = Instant::now();
        match model.generate(&prompt, self.config.max_new_tokens).await {
            Ok(text) => Ok((text, start.elapsed())),
            Err(e) => {
                error!("Error generating response with {}: {}", model.name(), e);
                Err(EngineError::Generation(e))
            }
        }
    }
}

fn validate(query: &str) -> Result<&str, EngineError> {
    let query = query.trim();
    if query.is_empty() {
        warn!("Received empty query");
        return Err(EngineError::EmptyQuery);
    }
    Ok(query)
}
