//! Values exchanged between the mutation executor, units of work and callers.

pub mod attempt;
pub mod outcome;

pub use attempt::MutationAttempt;
pub use outcome::{MutationOutcome, MutationResult, ResourceRef};
