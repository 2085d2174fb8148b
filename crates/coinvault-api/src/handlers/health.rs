//! Health check handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::response::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// GET /health
///
/// Answers 503 when the database is configured but unreachable.
pub async fn health(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let (status, database) = match &state.db {
        None => (StatusCode::OK, "memory"),
        Some(db) => match db.health_check().await {
            Ok(true) => (StatusCode::OK, "connected"),
            Ok(false) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            Err(e) => {
                tracing::warn!(error = %e, "Database health check failed");
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
            }
        },
    };

    let body = HealthResponse {
        status: if status == StatusCode::OK { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
    };
    (status, Json(ApiResponse::ok(body)))
}
