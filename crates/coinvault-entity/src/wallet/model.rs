//! Wallet entity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use coinvault_core::error::{codes, AppError};
use coinvault_core::result::AppResult;
use coinvault_core::types::UserId;

use crate::mutation::ResourceRef;

/// Largest quantity a single purchase may request.
pub const MAX_PURCHASE_QUANTITY: i32 = 10;

/// A user's coin balance and inventory row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    /// Owning user.
    pub user_id: UserId,
    /// Coin balance; never negative.
    pub coins: i64,
    /// Item keys the user owns.
    pub inventory: serde_json::Value,
    /// Last balance change.
    pub updated_at: DateTime<Utc>,
}

/// An item grant produced by a purchase.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entitlement {
    /// Entitlement identifier (`ent_...`).
    pub id: String,
    /// Owner.
    pub user_id: UserId,
    /// Granted item.
    pub item_key: String,
    /// Number of units.
    pub quantity: i32,
    /// Coins paid per unit.
    pub unit_price: i64,
    /// Why the entitlement exists (e.g. `"seasonal_purchase"`).
    pub granted_reason: String,
    /// Grant time.
    pub created_at: DateTime<Utc>,
}

/// Request to buy `quantity` units of an item at a fixed unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    /// Buyer.
    pub user_id: UserId,
    /// Item being bought.
    pub item_key: String,
    /// Units to buy.
    pub quantity: i32,
    /// Price per unit in coins.
    pub unit_price: i64,
}

impl PurchaseOrder {
    /// Check the order shape before any store access.
    pub fn validate(&self) -> AppResult<()> {
        if self.item_key.trim().is_empty() {
            return Err(AppError::validation("itemKey is required"));
        }
        if self.quantity <= 0 || self.quantity > MAX_PURCHASE_QUANTITY {
            return Err(AppError::validation(format!(
                "quantity must be between 1 and {MAX_PURCHASE_QUANTITY}"
            ))
            .with_code(codes::INVALID_QUANTITY));
        }
        if self.unit_price < 0 {
            return Err(
                AppError::validation("unitPrice must be >= 0").with_code(codes::INVALID_AMOUNT)
            );
        }
        self.total_cost().map(|_| ())
    }

    /// Total debit for the order.
    pub fn total_cost(&self) -> AppResult<i64> {
        self.unit_price
            .checked_mul(i64::from(self.quantity))
            .ok_or_else(|| {
                AppError::validation("order total overflows").with_code(codes::INVALID_AMOUNT)
            })
    }
}

/// Response body of a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    /// Buyer.
    pub user_id: UserId,
    /// Item bought.
    pub item_key: String,
    /// Units bought.
    pub quantity: i32,
    /// Coins debited.
    pub spent_coins: i64,
    /// Balance after the debit.
    pub remaining_coins: i64,
    /// Entitlement created for the purchase.
    pub entitlement_id: String,
}

impl ResourceRef for PurchaseReceipt {
    fn resource_type(&self) -> &'static str {
        "seasonal_purchase"
    }

    fn resource_id(&self) -> String {
        format!("{}:{}", self.user_id, self.item_key)
    }
}

/// Request to move coins from one wallet to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinTransfer {
    /// Sender, debited.
    pub from_user_id: UserId,
    /// Recipient, credited.
    pub to_user_id: UserId,
    /// Coins moved.
    pub amount: i64,
    /// Optional gift note.
    #[serde(default)]
    pub note: Option<String>,
}

impl CoinTransfer {
    /// Check the transfer shape before any store access.
    pub fn validate(&self) -> AppResult<()> {
        if self.amount <= 0 {
            return Err(AppError::validation("amount must be > 0").with_code(codes::INVALID_AMOUNT));
        }
        if self.from_user_id == self.to_user_id {
            return Err(AppError::validation("Cannot transfer coins to yourself")
                .with_code(codes::SELF_TRANSFER_FORBIDDEN));
        }
        Ok(())
    }
}

/// Response body of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    /// Transfer identifier (`xfer_...`).
    pub transfer_id: String,
    /// Sender.
    pub from_user_id: UserId,
    /// Recipient.
    pub to_user_id: UserId,
    /// Coins moved.
    pub amount: i64,
    /// Sender balance after the debit.
    pub sender_remaining_coins: i64,
}

impl ResourceRef for TransferReceipt {
    fn resource_type(&self) -> &'static str {
        "coin_transfer"
    }

    fn resource_id(&self) -> String {
        self.transfer_id.clone()
    }
}

/// Request to credit coins to a wallet (rewards, compensation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinGrant {
    /// Credited user; a wallet is opened if none exists.
    pub user_id: UserId,
    /// Coins credited.
    pub amount: i64,
    /// Why the coins were granted.
    pub reason: String,
}

impl CoinGrant {
    /// Check the grant shape before any store access.
    pub fn validate(&self) -> AppResult<()> {
        if self.amount <= 0 {
            return Err(AppError::validation("amount must be > 0").with_code(codes::INVALID_AMOUNT));
        }
        if self.reason.trim().is_empty() {
            return Err(AppError::validation("reason is required"));
        }
        Ok(())
    }
}

/// Response body of a completed grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantReceipt {
    /// Credited user.
    pub user_id: UserId,
    /// Coins credited.
    pub amount: i64,
    /// Grant reason.
    pub reason: String,
    /// Balance after the credit.
    pub balance: i64,
}

impl ResourceRef for GrantReceipt {
    fn resource_type(&self) -> &'static str {
        "wallet"
    }

    fn resource_id(&self) -> String {
        self.user_id.to_string()
    }
}
