//! Idempotency record entities.

pub mod model;
pub mod status;

pub use model::{IdempotencyRecord, NewAttempt, RecordOutcome};
pub use status::IdempotencyStatus;
