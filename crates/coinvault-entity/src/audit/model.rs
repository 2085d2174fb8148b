//! Audit event entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use coinvault_core::types::UserId;

/// Severity attached to an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    /// Routine state change.
    Info,
    /// Unusual but handled.
    Warning,
    /// A mutation failed.
    Error,
}

impl AuditSeverity {
    /// Return the severity as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable audit event recording who did what to which entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub id: String,
    /// The user who performed the action.
    pub actor_user_id: Option<UserId>,
    /// The user the action affected (differs from the actor when gifting).
    pub target_user_id: Option<UserId>,
    /// Domain object type (e.g. `"currency"`, `"seasonal_store_item"`).
    pub entity_type: String,
    /// Domain object identifier.
    pub entity_id: Option<String>,
    /// Dotted event name, conventionally `<operation>.succeeded` / `<operation>.failed`.
    pub event_type: String,
    /// Event severity.
    pub severity: AuditSeverity,
    /// Human-readable message.
    pub message: Option<String>,
    /// Request correlation id.
    pub request_id: Option<String>,
    /// Idempotency key of the attempt that produced the event.
    pub idempotency_key: Option<String>,
    /// Free-form structured payload.
    pub metadata: serde_json::Value,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// Data required to append an audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditEvent {
    /// Acting user.
    pub actor_user_id: Option<UserId>,
    /// Affected user.
    pub target_user_id: Option<UserId>,
    /// Domain object type.
    pub entity_type: String,
    /// Domain object id.
    pub entity_id: Option<String>,
    /// Dotted event name.
    pub event_type: String,
    /// Severity.
    pub severity: AuditSeverity,
    /// Message.
    pub message: Option<String>,
    /// Request correlation id.
    pub request_id: Option<String>,
    /// Idempotency key.
    pub idempotency_key: Option<String>,
    /// Structured payload.
    pub metadata: serde_json::Value,
}

impl CreateAuditEvent {
    /// Start an `info` event with no actor, target or metadata.
    pub fn new(entity_type: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            actor_user_id: None,
            target_user_id: None,
            entity_type: entity_type.into(),
            entity_id: None,
            event_type: event_type.into(),
            severity: AuditSeverity::Info,
            message: None,
            request_id: None,
            idempotency_key: None,
            metadata: serde_json::json!({}),
        }
    }

    /// Set actor and target.
    pub fn users(mut self, actor: Option<UserId>, target: Option<UserId>) -> Self {
        self.actor_user_id = actor;
        self.target_user_id = target;
        self
    }

    /// Set the entity id.
    pub fn entity_id(mut self, entity_id: Option<String>) -> Self {
        self.entity_id = entity_id;
        self
    }

    /// Set the severity.
    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the request id and idempotency key.
    pub fn correlation(mut self, request_id: Option<String>, idempotency_key: Option<String>) -> Self {
        self.request_id = request_id;
        self.idempotency_key = idempotency_key;
        self
    }

    /// Set the metadata payload.
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Materialize the event with an id and timestamp.
    pub fn into_event(self, id: String, created_at: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            id,
            actor_user_id: self.actor_user_id,
            target_user_id: self.target_user_id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            event_type: self.event_type,
            severity: self.severity,
            message: self.message,
            request_id: self.request_id,
            idempotency_key: self.idempotency_key,
            metadata: self.metadata,
            created_at,
        }
    }
}
