//! Response DTOs.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use coinvault_core::result::AppResult;
use coinvault_core::types::UserId;
use coinvault_entity::idempotency::IdempotencyStatus;
use coinvault_entity::mutation::MutationOutcome;
use coinvault_entity::wallet::Wallet;

use crate::error::log_error;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// `connected`, `unavailable` or `memory`.
    pub database: String,
}

/// Wallet read model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    /// Owner.
    pub user_id: UserId,
    /// Balance.
    pub coins: i64,
    /// Owned item keys.
    pub inventory: Value,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for WalletResponse {
    fn from(w: Wallet) -> Self {
        Self {
            user_id: w.user_id,
            coins: w.coins,
            inventory: w.inventory,
            updated_at: w.updated_at,
        }
    }
}

/// HTTP form of an executor outcome.
///
/// Successes merge the stored body into `{success, ..., replayed}` and answer
/// 201 when freshly executed, 200 when replayed. Failures answer with the
/// error's status and `{success: false, error, message, replayed}`, the same
/// shape whether fresh or read back.
#[derive(Debug, Clone)]
pub struct MutationResponse(pub MutationOutcome);

impl MutationResponse {
    /// Render an executor result.
    pub fn from_result(result: AppResult<MutationOutcome>) -> Self {
        match result {
            Ok(outcome) => Self(outcome),
            Err(err) => {
                log_error(&err);
                Self(MutationOutcome {
                    replayed: false,
                    status: IdempotencyStatus::Failed,
                    response_code: i32::from(err.kind.http_status()),
                    response_body: err.to_body(),
                    resource_type: None,
                    resource_id: None,
                })
            }
        }
    }

    fn status(&self) -> StatusCode {
        let outcome = &self.0;
        if !outcome.is_success() {
            return u16::try_from(outcome.response_code)
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        }
        if outcome.replayed {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        }
    }

    fn body(&self) -> Value {
        let outcome = &self.0;
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(outcome.is_success()));
        match &outcome.response_body {
            Value::Object(fields) => {
                for (k, v) in fields {
                    body.insert(k.clone(), v.clone());
                }
            }
            Value::Null => {}
            other => {
                body.insert("data".into(), other.clone());
            }
        }
        body.insert("replayed".into(), Value::Bool(outcome.replayed));
        Value::Object(body)
    }
}

impl IntoResponse for MutationResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
