//! Request correlation and timing.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub const RESPONSE_TIME_HEADER: HeaderName = HeaderName::from_static("x-response-time");

/// Paths served without request logging.
const QUIET_PATHS: &[&str] = &["/health"];

/// Propagates or assigns `X-Request-ID`, runs the handler inside a span
/// carrying it and stamps `X-Response-Time` on the response.
pub async fn request_context(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let quiet = QUIET_PATHS.iter().any(|p| path.starts_with(p));

    let span = info_span!("request", request_id = %request_id);

    if !quiet {
        info!(parent: &span, "Request started: {} {}", method, path);
    }

    let mut response = next.run(request).instrument(span.clone()).await;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status();

    if !quiet {
        if status.is_server_error() {
            warn!(
                parent: &span,
                "Request failed: {} {} - {} in {:.2}ms",
                method,
                path,
                status.as_u16(),
                elapsed_ms
            );
        } else {
            info!(
                parent: &span,
                "Request completed: {} {} - {} in {:.2}ms",
                method,
                path,
                status.as_u16(),
                elapsed_ms
            );
        }
    }

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{:.2}ms", elapsed_ms)) {
        headers.insert(RESPONSE_TIME_HEADER, value);
    }

    response
}
