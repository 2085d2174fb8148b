//! In-process wallet ledger.
//!
//! Every wallet row sits behind its own async mutex. Operations acquire the
//! mutexes of the rows they touch in [`LockSet`] order and validate against
//! the guarded state before writing, which mirrors `SELECT ... FOR UPDATE`
//! followed by a commit-or-rollback.
//!
//! While the rows are held, the succeeded outcome is written to the
//! idempotency store fenced on the attempt token. Rows are only changed once
//! that write lands, so a superseded attempt leaves every wallet untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use coinvault_core::result::AppResult;
use coinvault_core::types::{LockSet, UserId, new_id};
use coinvault_entity::mutation::{MutationAttempt, MutationResult};
use coinvault_entity::wallet::{
    CoinGrant, CoinTransfer, Entitlement, GrantReceipt, PurchaseOrder, PurchaseReceipt,
    TransferReceipt, Wallet,
};

use super::{WalletLedger, attempt_superseded, ensure_funds, user_not_found};
use crate::idempotency::IdempotencyStore;

#[derive(Debug)]
struct WalletRow {
    coins: i64,
    inventory: Vec<String>,
    updated_at: DateTime<Utc>,
}

impl WalletRow {
    fn new(coins: i64) -> Self {
        Self {
            coins,
            inventory: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    fn snapshot(&self, user_id: UserId) -> Wallet {
        Wallet {
            user_id,
            coins: self.coins,
            inventory: serde_json::json!(self.inventory),
            updated_at: self.updated_at,
        }
    }
}

type LockedRows = BTreeMap<UserId, OwnedMutexGuard<WalletRow>>;

/// DashMap-backed [`WalletLedger`].
pub struct MemoryWalletLedger {
    store: Arc<dyn IdempotencyStore>,
    wallets: DashMap<UserId, Arc<Mutex<WalletRow>>>,
    entitlements: Mutex<Vec<Entitlement>>,
    transfers: Mutex<Vec<TransferReceipt>>,
}

impl fmt::Debug for MemoryWalletLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWalletLedger")
            .field("wallets", &self.wallets.len())
            .finish_non_exhaustive()
    }
}

impl MemoryWalletLedger {
    /// Create an empty ledger that finalizes outcomes in `store`.
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self {
            store,
            wallets: DashMap::new(),
            entitlements: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
        }
    }

    /// Open (or reset) a wallet with a starting balance.
    pub fn seed(&self, user_id: UserId, coins: i64) {
        self.wallets
            .insert(user_id, Arc::new(Mutex::new(WalletRow::new(coins))));
    }

    /// Entitlements granted to a user.
    pub async fn entitlements(&self, user_id: UserId) -> Vec<Entitlement> {
        self.entitlements
            .lock()
            .await
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Every transfer recorded so far.
    pub async fn transfers(&self) -> Vec<TransferReceipt> {
        self.transfers.lock().await.clone()
    }

    fn row(&self, user_id: &UserId) -> Option<Arc<Mutex<WalletRow>>> {
        self.wallets.get(user_id).map(|r| r.value().clone())
    }

    /// Lock existing rows in lock-set order. Missing wallets are skipped.
    async fn lock_rows(&self, users: &LockSet<UserId>) -> LockedRows {
        let mut locked = BTreeMap::new();
        for user_id in users.iter() {
            if let Some(row) = self.row(user_id) {
                locked.insert(*user_id, row.lock_owned().await);
            }
        }
        locked
    }

    /// Record the succeeded outcome of `attempt`.
    ///
    /// Must be called with the affected rows locked and before any of them
    /// is written.
    async fn finalize(&self, attempt: &MutationAttempt, result: &MutationResult) -> AppResult<()> {
        if !self.store.update_result(&attempt.succeeded(result)).await? {
            return Err(attempt_superseded(attempt));
        }
        Ok(())
    }
}

#[async_trait]
impl WalletLedger for MemoryWalletLedger {
    async fn purchase(
        &self,
        attempt: &MutationAttempt,
        order: &PurchaseOrder,
    ) -> AppResult<PurchaseReceipt> {
        order.validate()?;
        let total = order.total_cost()?;

        let mut rows = self.lock_rows(&LockSet::new([order.user_id])).await;
        let wallet = rows
            .get_mut(&order.user_id)
            .ok_or_else(|| user_not_found(order.user_id))?;
        ensure_funds(wallet.coins, total)?;

        let receipt = PurchaseReceipt {
            user_id: order.user_id,
            item_key: order.item_key.clone(),
            quantity: order.quantity,
            spent_coins: total,
            remaining_coins: wallet.coins - total,
            entitlement_id: new_id("ent"),
        };
        self.finalize(attempt, &MutationResult::from_resource(&receipt)?).await?;

        let now = Utc::now();
        wallet.coins -= total;
        wallet
            .inventory
            .extend(std::iter::repeat_n(order.item_key.clone(), order.quantity as usize));
        wallet.updated_at = now;
        self.entitlements.lock().await.push(Entitlement {
            id: receipt.entitlement_id.clone(),
            user_id: order.user_id,
            item_key: order.item_key.clone(),
            quantity: order.quantity,
            unit_price: order.unit_price,
            granted_reason: "seasonal_purchase".to_string(),
            created_at: now,
        });

        debug!(key = %attempt.idempotency_key, user_id = %order.user_id, total, "Purchase applied");
        Ok(receipt)
    }

    async fn transfer(
        &self,
        attempt: &MutationAttempt,
        transfer: &CoinTransfer,
    ) -> AppResult<TransferReceipt> {
        transfer.validate()?;

        let mut rows = self
            .lock_rows(&LockSet::new([transfer.from_user_id, transfer.to_user_id]))
            .await;
        if !rows.contains_key(&transfer.to_user_id) {
            return Err(user_not_found(transfer.to_user_id));
        }
        let sender = rows
            .get_mut(&transfer.from_user_id)
            .ok_or_else(|| user_not_found(transfer.from_user_id))?;
        ensure_funds(sender.coins, transfer.amount)?;

        let receipt = TransferReceipt {
            transfer_id: new_id("xfer"),
            from_user_id: transfer.from_user_id,
            to_user_id: transfer.to_user_id,
            amount: transfer.amount,
            sender_remaining_coins: sender.coins - transfer.amount,
        };
        self.finalize(attempt, &MutationResult::from_resource(&receipt)?).await?;

        let now = Utc::now();
        sender.coins -= transfer.amount;
        sender.updated_at = now;
        if let Some(recipient) = rows.get_mut(&transfer.to_user_id) {
            recipient.coins += transfer.amount;
            recipient.updated_at = now;
        }
        self.transfers.lock().await.push(receipt.clone());

        debug!(key = %attempt.idempotency_key, transfer_id = %receipt.transfer_id, "Transfer applied");
        Ok(receipt)
    }

    async fn grant(&self, attempt: &MutationAttempt, grant: &CoinGrant) -> AppResult<GrantReceipt> {
        grant.validate()?;

        let row = self
            .wallets
            .entry(grant.user_id)
            .or_insert_with(|| Arc::new(Mutex::new(WalletRow::new(0))))
            .value()
            .clone();
        let mut wallet = row.lock_owned().await;

        let receipt = GrantReceipt {
            user_id: grant.user_id,
            amount: grant.amount,
            reason: grant.reason.clone(),
            balance: wallet.coins + grant.amount,
        };
        self.finalize(attempt, &MutationResult::from_resource(&receipt)?).await?;

        wallet.coins += grant.amount;
        wallet.updated_at = Utc::now();

        debug!(key = %attempt.idempotency_key, user_id = %grant.user_id, "Grant applied");
        Ok(receipt)
    }

    async fn balance(&self, user_id: UserId) -> AppResult<Option<Wallet>> {
        let Some(row) = self.row(&user_id) else {
            return Ok(None);
        };
        let wallet = row.lock().await;
        Ok(Some(wallet.snapshot(user_id)))
    }
}
