//! Service info and health check endpoints

use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use querylens_core::prompt::PROMPT_VERSION;
use serde::Serialize;

use crate::AppState;

const SERVICE_NAME: &str = "querylens";

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub prompt_version: String,
    pub endpoints: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// False until the first model-backed request (or `--preload`) finishes loading.
    pub model_loaded: bool,
}

/// GET /
pub async fn service_info() -> Json<ServiceInfo> {
    let endpoints = [
        ("/parse", "Parse a search query into structured data"),
        ("/test", "Keyword-based parsing without the language model"),
        ("/debug", "Raw model output for a query"),
        ("/health", "Health check endpoint"),
    ]
    .into_iter()
    .map(|(path, description)| (path.to_string(), description.to_string()))
    .collect();

    Json(ServiceInfo {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        prompt_version: PROMPT_VERSION.to_string(),
        endpoints,
    })
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: state.engine.is_model_loaded(),
    })
}

/// Build service info and health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
}
