//! # coinvault-database
//!
//! PostgreSQL connection management and the storage side of the idempotent
//! mutation engine: the idempotency store, the append-only audit ledger,
//! the [`UnitOfWork`] that encodes the balance-mutation discipline, and the
//! wallet ledger built on it. Every store has an in-memory twin for
//! single-node use and tests.

pub mod audit;
pub mod connection;
pub mod error;
pub mod idempotency;
pub mod ledger;
pub mod migration;
pub mod transaction;

pub use audit::{AuditLogRepository, AuditSink, MemoryAuditLog};
pub use connection::DatabasePool;
pub use idempotency::{IdempotencyRepository, IdempotencyStore, MemoryIdempotencyStore};
pub use ledger::{MemoryWalletLedger, PgWalletLedger, WalletLedger};
pub use transaction::UnitOfWork;
