//! # coinvault-core
//!
//! Core crate for CoinVault. Contains the unified error system,
//! configuration schemas, typed identifiers, the canonical row-lock
//! ordering, and the metrics contract consumed by the mutation executor.
//!
//! This crate has **no** internal dependencies on other CoinVault crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
