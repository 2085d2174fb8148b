//! Request/response logging middleware.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

use crate::extractors::caller::REQUEST_ID_HEADER;
use crate::extractors::idempotency::{IDEMPOTENCY_KEY_HEADER, LEGACY_IDEMPOTENCY_KEY_HEADER};

/// Logs request method, path, status and duration with the correlation headers.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers();
    let request_id = header(headers, REQUEST_ID_HEADER);
    let idempotency_key = header(headers, IDEMPOTENCY_KEY_HEADER)
        .or_else(|| header(headers, LEGACY_IDEMPOTENCY_KEY_HEADER));
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        request_id = request_id.as_deref().unwrap_or("-"),
        idempotency_key = idempotency_key.as_deref().unwrap_or("-"),
        "HTTP request"
    );

    response
}

fn header(headers: &axum::http::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
