//! # coinvault-service
//!
//! The idempotent mutation executor and the services built on it. The
//! executor turns any caller-supplied unit of work into an at-most-once
//! operation keyed by `(scope, idempotency_key)`; the wallet service runs
//! the purchase, gifting and reward mutations through it.
//!
//! Services follow constructor injection: stores, ledgers and metrics
//! sinks are provided at construction time as `Arc` trait objects.

pub mod audit;
pub mod context;
pub mod metrics;
pub mod mutation;
pub mod wallet;

pub use audit::AuditService;
pub use context::RequestContext;
pub use metrics::{ChannelSnapshot, MutationMetrics};
pub use mutation::{MutationExecutor, MutationRequest};
pub use wallet::WalletService;
