//! Append-only audit ledger.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use coinvault_core::result::AppResult;
use coinvault_entity::audit::{AuditEvent, CreateAuditEvent};

pub use memory::MemoryAuditLog;
pub use postgres::AuditLogRepository;

/// Destination for audit events. Implementations never update or delete.
#[async_trait]
pub trait AuditSink: Send + Sync + fmt::Debug {
    /// Append one event and return it as stored.
    async fn append(&self, event: &CreateAuditEvent) -> AppResult<AuditEvent>;

    /// Events correlated with an idempotency key, oldest first.
    async fn list_by_idempotency_key(&self, key: &str) -> AppResult<Vec<AuditEvent>>;
}
