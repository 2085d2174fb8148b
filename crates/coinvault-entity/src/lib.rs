//! # coinvault-entity
//!
//! Domain entity models for CoinVault. Every struct in this crate
//! represents a database table row or a domain value object. Database
//! entities additionally derive `sqlx::FromRow`.

pub mod audit;
pub mod idempotency;
pub mod mutation;
pub mod wallet;
