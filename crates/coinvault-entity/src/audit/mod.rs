//! Economy audit ledger entities.

pub mod model;

pub use model::{AuditEvent, AuditSeverity, CreateAuditEvent};
