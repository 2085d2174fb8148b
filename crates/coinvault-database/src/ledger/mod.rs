//! Wallet balance mutations.
//!
//! Each operation is a complete unit of work: it locks the wallet rows it
//! touches in [`LockSet`](coinvault_core::types::LockSet) order, re-checks
//! its preconditions against the locked rows, and applies every write or
//! none of them.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use tracing::warn;

use coinvault_core::error::{codes, AppError};
use coinvault_core::result::AppResult;
use coinvault_core::types::UserId;
use coinvault_entity::mutation::MutationAttempt;
use coinvault_entity::wallet::{
    CoinGrant, CoinTransfer, GrantReceipt, PurchaseOrder, PurchaseReceipt, TransferReceipt, Wallet,
};

pub use memory::MemoryWalletLedger;
pub use postgres::PgWalletLedger;

/// Balance-mutating operations on user wallets.
#[async_trait]
pub trait WalletLedger: Send + Sync + fmt::Debug {
    /// Debit `quantity * unit_price` coins and grant the item.
    async fn purchase(
        &self,
        attempt: &MutationAttempt,
        order: &PurchaseOrder,
    ) -> AppResult<PurchaseReceipt>;

    /// Move coins from one wallet to another.
    async fn transfer(
        &self,
        attempt: &MutationAttempt,
        transfer: &CoinTransfer,
    ) -> AppResult<TransferReceipt>;

    /// Credit coins, opening the wallet if needed.
    async fn grant(&self, attempt: &MutationAttempt, grant: &CoinGrant) -> AppResult<GrantReceipt>;

    /// Current wallet state.
    async fn balance(&self, user_id: UserId) -> AppResult<Option<Wallet>>;
}

pub(crate) fn user_not_found(user_id: UserId) -> AppError {
    AppError::not_found(format!("User {user_id} not found")).with_code(codes::USER_NOT_FOUND)
}

/// `FENCING_TOKEN_LOST`: `attempt` no longer owns its idempotency record.
pub(crate) fn attempt_superseded(attempt: &MutationAttempt) -> AppError {
    warn!(
        scope = %attempt.scope,
        key = %attempt.idempotency_key,
        attempt = attempt.attempt,
        "Attempt superseded before commit, rolling back"
    );
    AppError::conflict("Idempotency record was taken over by a newer attempt")
        .with_code(codes::FENCING_TOKEN_LOST)
}

/// Fails with `INSUFFICIENT_COINS` unless `balance` covers `cost`.
pub(crate) fn ensure_funds(balance: i64, cost: i64) -> AppResult<()> {
    if balance < cost {
        return Err(AppError::conflict(format!(
            "Insufficient coins: balance {balance}, required {cost}"
        ))
        .with_code(codes::INSUFFICIENT_COINS));
    }
    Ok(())
}
