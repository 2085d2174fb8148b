//! Route handlers organized by domain.

pub mod audit;
pub mod gifting;
pub mod health;
pub mod metrics;
pub mod rewards;
pub mod store;
pub mod wallet;
