//! Wallet mutations run through the idempotent executor.

pub mod service;

pub use service::{GRANT_SCOPE, PURCHASE_SCOPE, TRANSFER_SCOPE, WalletService};
