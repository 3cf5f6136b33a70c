//! Query endpoints: `/parse`, `/test` and `/debug`.

use axum::{extract::State, routing::post, Json, Router};
use querylens_core::{DebugResponse, QueryResponse};
use serde::Deserialize;

use super::ApiError;
use crate::AppState;

/// Request body shared by all query endpoints.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// POST /parse
///
/// Model-backed parsing, served from the cache when possible.
pub async fn parse_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let response = state.engine.handle(&request.query).await?;
    Ok(Json(response))
}

/// POST /test
///
/// Keyword classifier; never loads the model or touches the cache.
pub async fn test_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let response = state.engine.classify(&request.query)?;
    Ok(Json(response))
}

/// POST /debug
pub async fn debug_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<DebugResponse>, ApiError> {
    let response = state.engine.debug(&request.query).await?;
    Ok(Json(response))
}

pub fn query_routes() -> Router<AppState> {
    Router::new()
        .route("/parse", post(parse_query))
        .route("/test", post(test_query))
        .route("/debug", post(debug_query))
}
