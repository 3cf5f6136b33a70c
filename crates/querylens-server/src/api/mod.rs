//! HTTP API handlers

pub mod error;
pub mod health;
pub mod query;

pub use error::ApiError;
pub use health::health_routes;
pub use query::{debug_query, parse_query, query_routes, test_query, QueryRequest};
