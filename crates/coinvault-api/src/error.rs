//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use coinvault_core::error::{AppError, ErrorKind};

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Optional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Handler error wrapper so `AppError` can be returned from Axum handlers.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.kind.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        log_error(&err);

        let body = ApiErrorResponse {
            error: err.code(),
            message: err.message.clone(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Log server-side failures before they are rendered.
pub(crate) fn log_error(err: &AppError) {
    match err.kind {
        ErrorKind::Internal
        | ErrorKind::Database
        | ErrorKind::Configuration
        | ErrorKind::Serialization => {
            tracing::error!(error = %err, "Internal server error");
        }
        ErrorKind::ServiceUnavailable => {
            tracing::warn!(error = %err, "Service temporarily unavailable");
        }
        _ => {}
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
