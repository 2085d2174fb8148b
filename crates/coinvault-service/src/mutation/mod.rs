//! Idempotent mutation execution.

pub mod executor;
pub mod hash;
pub mod request;

pub use executor::MutationExecutor;
pub use hash::request_hash;
pub use request::MutationRequest;
