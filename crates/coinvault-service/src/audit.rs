//! Standalone audit records.
//!
//! Mutations get their audit events from the executor. This service covers
//! the remaining cases, such as a currency credit issued by a background
//! job with no user-facing endpoint.

use std::sync::Arc;

use coinvault_core::error::AppError;
use coinvault_core::result::AppResult;
use coinvault_database::audit::AuditSink;
use coinvault_entity::audit::{AuditEvent, CreateAuditEvent};

use crate::context::RequestContext;

/// Appends and reads audit events.
#[derive(Debug, Clone)]
pub struct AuditService {
    sink: Arc<dyn AuditSink>,
}

impl AuditService {
    /// Creates a new audit service.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Append an event outside of any mutation.
    ///
    /// The context's actor and request id fill in fields the event leaves
    /// empty.
    pub async fn append_audit_event(
        &self,
        ctx: &RequestContext,
        mut event: CreateAuditEvent,
    ) -> AppResult<AuditEvent> {
        if event.entity_type.trim().is_empty() {
            return Err(AppError::validation("entity_type is required"));
        }
        if event.event_type.trim().is_empty() {
            return Err(AppError::validation("event_type is required"));
        }
        if event.actor_user_id.is_none() {
            event.actor_user_id = ctx.actor;
        }
        if event.request_id.is_none() {
            event.request_id = ctx.request_id.clone();
        }
        self.sink.append(&event).await
    }

    /// Events correlated with an idempotency key.
    pub async fn events_for_key(&self, idempotency_key: &str) -> AppResult<Vec<AuditEvent>> {
        self.sink.list_by_idempotency_key(idempotency_key).await
    }
}
