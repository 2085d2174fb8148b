//! Idempotency record entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::IdempotencyStatus;

/// Durable record of one logical mutation attempt, unique per
/// `(scope, idempotency_key)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IdempotencyRecord {
    /// Record identifier.
    pub id: String,
    /// Logical operation name partitioning the key namespace.
    pub scope: String,
    /// Client-supplied key.
    pub idempotency_key: String,
    /// Hash of the request payload, if one was supplied.
    pub request_hash: Option<String>,
    /// Lifecycle state.
    pub status: IdempotencyStatus,
    /// Fencing token, bumped every time an expired attempt is reclaimed.
    pub attempt: i32,
    /// When the current owner's claim expires. `None` once released.
    pub locked_until: Option<DateTime<Utc>>,
    /// HTTP status recorded with the terminal outcome.
    pub response_code: Option<i32>,
    /// Response body replayed to every later caller.
    pub response_body: Option<serde_json::Value>,
    /// Type of the domain entity the mutation affected.
    pub resource_type: Option<String>,
    /// Identifier of the domain entity the mutation affected.
    pub resource_id: Option<String>,
    /// When the key was first seen.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
    /// Last time any caller presented this key.
    pub last_seen_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Whether an attempt holds an unexpired claim at `now`.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.status == IdempotencyStatus::InProgress
            && self.locked_until.is_some_and(|until| until > now)
    }

    /// Whether the owner gave the record up after a retryable failure.
    pub fn is_released(&self) -> bool {
        self.status == IdempotencyStatus::InProgress && self.locked_until.is_none()
    }
}

/// Data required to register a first attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttempt {
    /// Record identifier to use if the row is inserted.
    pub id: String,
    /// Operation scope.
    pub scope: String,
    /// Client-supplied key.
    pub idempotency_key: String,
    /// Hash of the request payload.
    pub request_hash: Option<String>,
    /// Claim expiry for the inserting attempt.
    pub locked_until: DateTime<Utc>,
}

/// Terminal outcome written by the attempt that owns a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Operation scope.
    pub scope: String,
    /// Client-supplied key.
    pub idempotency_key: String,
    /// Fencing token the writer holds; the write is ignored if it is stale.
    pub attempt: i32,
    /// Terminal status.
    pub status: IdempotencyStatus,
    /// HTTP status to replay.
    pub response_code: i32,
    /// Body to replay.
    pub response_body: serde_json::Value,
    /// Affected entity type.
    pub resource_type: Option<String>,
    /// Affected entity id.
    pub resource_id: Option<String>,
}
