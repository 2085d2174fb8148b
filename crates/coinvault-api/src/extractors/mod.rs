//! Custom Axum extractors.

pub mod caller;
pub mod idempotency;

pub use caller::{Actor, Caller};
pub use idempotency::IdempotencyKey;
