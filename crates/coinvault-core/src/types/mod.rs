//! Core type definitions used across the CoinVault workspace.

pub mod id;
pub mod lock_order;

pub use id::*;
pub use lock_order::LockSet;
