//! `IdempotencyKey` extractor: reads the client-generated key from the headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use coinvault_core::error::{AppError, codes};

use crate::error::ApiError;

/// Preferred header name.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
/// Legacy header name, still accepted.
pub const LEGACY_IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// The idempotency key of a mutating request.
///
/// Length limits are enforced by the executor; this extractor only rejects
/// a missing or blank header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(pub String);

impl IdempotencyKey {
    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for IdempotencyKey {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = [IDEMPOTENCY_KEY_HEADER, LEGACY_IDEMPOTENCY_KEY_HEADER]
            .iter()
            .filter_map(|name| parts.headers.get(*name))
            .filter_map(|value| value.to_str().ok())
            .map(str::trim)
            .find(|value| !value.is_empty())
            .ok_or_else(|| {
                AppError::validation("Idempotency-Key header is required")
                    .with_code(codes::IDEMPOTENCY_KEY_REQUIRED)
            })?;

        Ok(Self(key.to_string()))
    }
}
