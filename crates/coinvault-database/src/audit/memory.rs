//! In-process audit ledger.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use coinvault_core::error::AppError;
use coinvault_core::result::AppResult;
use coinvault_core::types::new_id;
use coinvault_entity::audit::{AuditEvent, CreateAuditEvent};

use super::AuditSink;

/// Vec-backed [`AuditSink`]. Can be switched into a failing mode to
/// exercise callers' handling of an unavailable ledger.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
    unavailable: AtomicBool,
}

impl MemoryAuditLog {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// All events in append order.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }

    /// Number of events recorded.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, event: &CreateAuditEvent) -> AppResult<AuditEvent> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::service_unavailable("Audit ledger unavailable"));
        }
        let stored = event.clone().into_event(new_id("audit"), Utc::now());
        self.events.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_by_idempotency_key(&self, key: &str) -> AppResult<Vec<AuditEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.idempotency_key.as_deref() == Some(key))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinvault_entity::audit::AuditSeverity;

    #[tokio::test]
    async fn test_append_and_filter_by_key() {
        let log = MemoryAuditLog::new();
        let event = CreateAuditEvent::new("currency", "gifting.transfer.succeeded")
            .correlation(Some("req-1".into()), Some("K1".into()));
        let stored = log.append(&event).await.unwrap();
        assert!(stored.id.starts_with("audit_"));
        assert_eq!(stored.severity, AuditSeverity::Info);

        log.append(&CreateAuditEvent::new("currency", "other"))
            .await
            .unwrap();

        let matched = log.list_by_idempotency_key("K1").await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].request_id.as_deref(), Some("req-1"));
        assert_eq!(log.len().await, 2);
    }

    #[tokio::test]
    async fn test_unavailable_ledger_rejects_appends() {
        let log = MemoryAuditLog::new();
        log.set_unavailable(true);
        let err = log
            .append(&CreateAuditEvent::new("currency", "x"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(log.len().await, 0);
    }
}
