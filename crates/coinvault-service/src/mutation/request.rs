//! Executor request arguments.

use std::time::Duration;

use coinvault_core::config::IdempotencyConfig;
use coinvault_core::error::{codes, AppError};
use coinvault_core::result::AppResult;
use coinvault_core::types::UserId;

/// Everything the executor needs besides the unit of work itself.
///
/// Only `scope` and `idempotency_key` are required; the remaining fields
/// shape the request hash, the claim duration and the audit event.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    /// Logical operation name, e.g. `store.seasonal.purchase`.
    pub scope: String,
    /// Client-supplied key.
    pub idempotency_key: String,
    /// Request payload fingerprinted to detect key reuse.
    pub payload: Option<serde_json::Value>,
    /// Claim duration; the configured default when absent.
    pub lock_duration: Option<Duration>,
    /// Acting user.
    pub actor_user_id: Option<UserId>,
    /// Affected user.
    pub target_user_id: Option<UserId>,
    /// Audit entity type; the scope when absent.
    pub entity_type: Option<String>,
    /// Audit entity id; the result's resource id when absent.
    pub entity_id: Option<String>,
    /// Audit event prefix; the scope when absent.
    pub event_type: Option<String>,
    /// Request correlation id.
    pub request_id: Option<String>,
}

impl MutationRequest {
    /// Start a request for `(scope, idempotency_key)`.
    pub fn new(scope: impl Into<String>, idempotency_key: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            idempotency_key: idempotency_key.into(),
            payload: None,
            lock_duration: None,
            actor_user_id: None,
            target_user_id: None,
            entity_type: None,
            entity_id: None,
            event_type: None,
            request_id: None,
        }
    }

    /// Set the payload to fingerprint.
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Override the claim duration.
    pub fn lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = Some(duration);
        self
    }

    /// Set actor and target users.
    pub fn users(mut self, actor: Option<UserId>, target: Option<UserId>) -> Self {
        self.actor_user_id = actor;
        self.target_user_id = target;
        self
    }

    /// Set the audit entity.
    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: Option<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = entity_id;
        self
    }

    /// Set the audit event prefix.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Set the request correlation id.
    pub fn request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Trim scope and key and check them against the configured limits.
    pub(crate) fn normalize(mut self, config: &IdempotencyConfig) -> AppResult<Self> {
        let scope = self.scope.trim();
        if scope.is_empty() || scope.chars().count() > config.max_scope_length {
            return Err(AppError::validation(format!(
                "scope must be 1..={} characters",
                config.max_scope_length
            ))
            .with_code(codes::INVALID_SCOPE));
        }
        let key = self.idempotency_key.trim();
        if key.is_empty() || key.chars().count() > config.max_key_length {
            return Err(AppError::validation(format!(
                "idempotency key must be 1..={} characters",
                config.max_key_length
            ))
            .with_code(codes::INVALID_IDEMPOTENCY_KEY));
        }
        if self.lock_duration.is_some_and(|d| d.is_zero()) {
            return Err(AppError::validation("lock duration must be positive"));
        }
        self.scope = scope.to_string();
        self.idempotency_key = key.to_string();
        Ok(self)
    }

    /// Audit event name for an attempt ending in `status`.
    pub(crate) fn audit_event_type(&self, status: &str) -> String {
        format!("{}.{status}", self.event_type.as_deref().unwrap_or(&self.scope))
    }
}
