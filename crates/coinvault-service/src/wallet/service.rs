//! Purchase, gifting and reward mutations.

use std::sync::Arc;

use coinvault_core::error::{codes, AppError};
use coinvault_core::result::AppResult;
use coinvault_core::types::UserId;
use coinvault_database::ledger::WalletLedger;
use coinvault_entity::mutation::{MutationOutcome, MutationResult};
use coinvault_entity::wallet::{CoinGrant, CoinTransfer, PurchaseOrder, Wallet};

use crate::context::RequestContext;
use crate::mutation::{MutationExecutor, MutationRequest};

/// Scope of seasonal store purchases.
pub const PURCHASE_SCOPE: &str = "store.seasonal.purchase";
/// Scope of user-to-user coin gifts.
pub const TRANSFER_SCOPE: &str = "gifting.transfer";
/// Scope of reward credits.
pub const GRANT_SCOPE: &str = "rewards.grant";

/// Wallet use cases.
///
/// Request shapes are validated before the executor is involved, so a
/// malformed request never claims an idempotency key.
#[derive(Debug, Clone)]
pub struct WalletService {
    executor: Arc<MutationExecutor>,
    ledger: Arc<dyn WalletLedger>,
}

impl WalletService {
    /// Creates a new wallet service.
    pub fn new(executor: Arc<MutationExecutor>, ledger: Arc<dyn WalletLedger>) -> Self {
        Self { executor, ledger }
    }

    /// Buy a seasonal item.
    pub async fn purchase(
        &self,
        ctx: &RequestContext,
        idempotency_key: &str,
        order: PurchaseOrder,
    ) -> AppResult<MutationOutcome> {
        order.validate()?;

        let request = MutationRequest::new(PURCHASE_SCOPE, idempotency_key)
            .payload(serde_json::to_value(&order)?)
            .users(ctx.actor.or(Some(order.user_id)), Some(order.user_id))
            .entity("seasonal_store_item", Some(order.item_key.clone()))
            .event_type("seasonal_purchase")
            .request_id(ctx.request_id.clone());

        let ledger = self.ledger.clone();
        self.executor
            .execute(request, move |attempt| async move {
                let receipt = ledger.purchase(&attempt, &order).await?;
                MutationResult::from_resource(&receipt)
            })
            .await
    }

    /// Gift coins to another user.
    pub async fn transfer(
        &self,
        ctx: &RequestContext,
        idempotency_key: &str,
        transfer: CoinTransfer,
    ) -> AppResult<MutationOutcome> {
        transfer.validate()?;

        let request = MutationRequest::new(TRANSFER_SCOPE, idempotency_key)
            .payload(serde_json::to_value(&transfer)?)
            .users(
                ctx.actor.or(Some(transfer.from_user_id)),
                Some(transfer.to_user_id),
            )
            .entity("currency", None)
            .event_type("gift_transfer")
            .request_id(ctx.request_id.clone());

        let ledger = self.ledger.clone();
        self.executor
            .execute(request, move |attempt| async move {
                let receipt = ledger.transfer(&attempt, &transfer).await?;
                MutationResult::from_resource(&receipt)
            })
            .await
    }

    /// Credit reward coins.
    pub async fn grant(
        &self,
        ctx: &RequestContext,
        idempotency_key: &str,
        grant: CoinGrant,
    ) -> AppResult<MutationOutcome> {
        grant.validate()?;

        let request = MutationRequest::new(GRANT_SCOPE, idempotency_key)
            .payload(serde_json::to_value(&grant)?)
            .users(ctx.actor, Some(grant.user_id))
            .entity("currency", Some(grant.user_id.to_string()))
            .event_type("reward_grant")
            .request_id(ctx.request_id.clone());

        let ledger = self.ledger.clone();
        self.executor
            .execute(request, move |attempt| async move {
                let receipt = ledger.grant(&attempt, &grant).await?;
                MutationResult::from_resource(&receipt)
            })
            .await
    }

    /// Current wallet of a user.
    pub async fn balance(&self, user_id: UserId) -> AppResult<Wallet> {
        self.ledger.balance(user_id).await?.ok_or_else(|| {
            AppError::not_found(format!("User {user_id} not found")).with_code(codes::USER_NOT_FOUND)
        })
    }
}
