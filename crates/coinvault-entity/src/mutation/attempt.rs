//! The identity of the attempt currently running a unit of work.

use serde::{Deserialize, Serialize};

use coinvault_core::error::AppError;
use coinvault_core::types::UserId;

use crate::idempotency::{IdempotencyStatus, RecordOutcome};

use super::outcome::MutationResult;

/// Handed to a unit of work so it can fence its writes and correlate its
/// audit events with the idempotency record that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationAttempt {
    /// Operation scope.
    pub scope: String,
    /// Client-supplied key.
    pub idempotency_key: String,
    /// Fencing token held by this attempt.
    pub attempt: i32,
    /// User the request acts on behalf of.
    pub actor: Option<UserId>,
    /// Request correlation id.
    pub request_id: Option<String>,
}

impl MutationAttempt {
    /// The succeeded outcome this attempt writes for `result`.
    pub fn succeeded(&self, result: &MutationResult) -> RecordOutcome {
        RecordOutcome {
            scope: self.scope.clone(),
            idempotency_key: self.idempotency_key.clone(),
            attempt: self.attempt,
            status: IdempotencyStatus::Succeeded,
            response_code: 200,
            response_body: result.body.clone(),
            resource_type: result.resource_type.clone(),
            resource_id: result.resource_id.clone(),
        }
    }

    /// The failed outcome this attempt writes for a non-retryable error.
    pub fn failed(&self, err: &AppError) -> RecordOutcome {
        RecordOutcome {
            scope: self.scope.clone(),
            idempotency_key: self.idempotency_key.clone(),
            attempt: self.attempt,
            status: IdempotencyStatus::Failed,
            response_code: i32::from(err.kind.http_status()),
            response_body: err.to_body(),
            resource_type: None,
            resource_id: None,
        }
    }
}
