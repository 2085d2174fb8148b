//! PostgreSQL wallet ledger.

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use tracing::debug;

use coinvault_core::result::AppResult;
use coinvault_core::types::{LockSet, UserId, new_id};
use coinvault_entity::audit::CreateAuditEvent;
use coinvault_entity::mutation::{MutationAttempt, MutationResult};
use coinvault_entity::wallet::{
    CoinGrant, CoinTransfer, GrantReceipt, PurchaseOrder, PurchaseReceipt, TransferReceipt, Wallet,
};

use super::{WalletLedger, ensure_funds, user_not_found};
use crate::error::map_db_error;
use crate::transaction::UnitOfWork;

/// [`WalletLedger`] over `user_wallets`, `entitlements` and `coin_transfers`.
///
/// Every operation finalizes its idempotency record inside its own
/// transaction, so a committed balance change is never left without a
/// recorded outcome.
#[derive(Debug, Clone)]
pub struct PgWalletLedger {
    pool: PgPool,
}

impl PgWalletLedger {
    /// Create a new wallet ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a wallet with a starting balance if the user has none.
    pub async fn open_wallet(&self, user_id: UserId, coins: i64) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_wallets (user_id, coins) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(coins)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to open wallet", e))?;
        Ok(())
    }
}

fn ledger_event(attempt: &MutationAttempt, event_type: &str, user_id: UserId) -> CreateAuditEvent {
    CreateAuditEvent::new("currency", event_type)
        .users(attempt.actor, Some(user_id))
        .entity_id(Some(user_id.to_string()))
        .correlation(
            attempt.request_id.clone(),
            Some(attempt.idempotency_key.clone()),
        )
}

#[async_trait]
impl WalletLedger for PgWalletLedger {
    async fn purchase(
        &self,
        attempt: &MutationAttempt,
        order: &PurchaseOrder,
    ) -> AppResult<PurchaseReceipt> {
        order.validate()?;
        let total = order.total_cost()?;

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let wallets = uow.lock_wallets(&LockSet::new([order.user_id])).await?;
        let wallet = wallets
            .get(&order.user_id)
            .ok_or_else(|| user_not_found(order.user_id))?;
        ensure_funds(wallet.coins, total)?;

        let remaining = uow.adjust_coins(order.user_id, -total).await?;
        let items: Vec<String> =
            std::iter::repeat_n(order.item_key.clone(), order.quantity as usize).collect();
        uow.push_inventory(order.user_id, &items).await?;

        let entitlement_id = new_id("ent");
        sqlx::query(
            "INSERT INTO entitlements \
                (id, user_id, item_key, quantity, unit_price, granted_reason) \
             VALUES ($1, $2, $3, $4, $5, 'seasonal_purchase')",
        )
        .bind(&entitlement_id)
        .bind(order.user_id)
        .bind(&order.item_key)
        .bind(order.quantity)
        .bind(order.unit_price)
        .execute(uow.conn())
        .await
        .map_err(|e| map_db_error("Failed to create entitlement", e))?;

        uow.append_audit(&ledger_event(attempt, "currency.debit", order.user_id).metadata(json!({
            "reason": "seasonal_purchase",
            "itemKey": order.item_key,
            "quantity": order.quantity,
            "amount": total,
        })))
        .await?;

        let receipt = PurchaseReceipt {
            user_id: order.user_id,
            item_key: order.item_key.clone(),
            quantity: order.quantity,
            spent_coins: total,
            remaining_coins: remaining,
            entitlement_id,
        };
        uow.finalize(attempt, &MutationResult::from_resource(&receipt)?)
            .await?;
        uow.commit().await?;

        debug!(user_id = %order.user_id, item_key = %order.item_key, total, "Purchase committed");
        Ok(receipt)
    }

    async fn transfer(
        &self,
        attempt: &MutationAttempt,
        transfer: &CoinTransfer,
    ) -> AppResult<TransferReceipt> {
        transfer.validate()?;

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let wallets = uow
            .lock_wallets(&LockSet::new([transfer.from_user_id, transfer.to_user_id]))
            .await?;
        let sender = wallets
            .get(&transfer.from_user_id)
            .ok_or_else(|| user_not_found(transfer.from_user_id))?;
        if !wallets.contains_key(&transfer.to_user_id) {
            return Err(user_not_found(transfer.to_user_id));
        }
        ensure_funds(sender.coins, transfer.amount)?;

        let sender_remaining = uow
            .adjust_coins(transfer.from_user_id, -transfer.amount)
            .await?;
        uow.adjust_coins(transfer.to_user_id, transfer.amount)
            .await?;

        let transfer_id = new_id("xfer");
        sqlx::query(
            "INSERT INTO coin_transfers (id, from_user_id, to_user_id, amount, note) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&transfer_id)
        .bind(transfer.from_user_id)
        .bind(transfer.to_user_id)
        .bind(transfer.amount)
        .bind(&transfer.note)
        .execute(uow.conn())
        .await
        .map_err(|e| map_db_error("Failed to record transfer", e))?;

        let metadata = json!({
            "reason": "gift",
            "transferId": transfer_id,
            "amount": transfer.amount,
        });
        uow.append_audit(
            &ledger_event(attempt, "currency.debit", transfer.from_user_id)
                .metadata(metadata.clone()),
        )
        .await?;
        uow.append_audit(
            &ledger_event(attempt, "currency.credit", transfer.to_user_id).metadata(metadata),
        )
        .await?;

        let receipt = TransferReceipt {
            transfer_id,
            from_user_id: transfer.from_user_id,
            to_user_id: transfer.to_user_id,
            amount: transfer.amount,
            sender_remaining_coins: sender_remaining,
        };
        uow.finalize(attempt, &MutationResult::from_resource(&receipt)?)
            .await?;
        uow.commit().await?;
        Ok(receipt)
    }

    async fn grant(&self, attempt: &MutationAttempt, grant: &CoinGrant) -> AppResult<GrantReceipt> {
        grant.validate()?;

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        uow.lock_or_open_wallet(grant.user_id).await?;
        let balance = uow.adjust_coins(grant.user_id, grant.amount).await?;

        uow.append_audit(&ledger_event(attempt, "currency.credit", grant.user_id).metadata(json!({
            "reason": grant.reason,
            "amount": grant.amount,
        })))
        .await?;

        let receipt = GrantReceipt {
            user_id: grant.user_id,
            amount: grant.amount,
            reason: grant.reason.clone(),
            balance,
        };
        uow.finalize(attempt, &MutationResult::from_resource(&receipt)?)
            .await?;
        uow.commit().await?;
        Ok(receipt)
    }

    async fn balance(&self, user_id: UserId) -> AppResult<Option<Wallet>> {
        sqlx::query_as::<_, Wallet>("SELECT * FROM user_wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to load wallet", e))
    }
}
