//! Request DTOs.
//!
//! The acting user of a purchase or transfer comes from the gateway header,
//! never from the body.

use serde::{Deserialize, Serialize};

use coinvault_core::types::UserId;
use coinvault_entity::audit::{AuditSeverity, CreateAuditEvent};
use coinvault_entity::wallet::{CoinGrant, CoinTransfer, PurchaseOrder};

/// POST /api/store/purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    /// Item to buy.
    pub item_key: String,
    /// Units to buy.
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    /// Price per unit in coins.
    pub unit_price: i64,
}

fn default_quantity() -> i32 {
    1
}

impl PurchaseRequest {
    /// Bind the request to the buyer.
    pub fn into_order(self, buyer: UserId) -> PurchaseOrder {
        PurchaseOrder {
            user_id: buyer,
            item_key: self.item_key,
            quantity: self.quantity,
            unit_price: self.unit_price,
        }
    }
}

/// POST /api/gifts/transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Recipient.
    pub to_user_id: UserId,
    /// Coins to send.
    pub amount: i64,
    /// Optional note.
    #[serde(default)]
    pub note: Option<String>,
}

impl TransferRequest {
    /// Bind the request to the sender.
    pub fn into_transfer(self, sender: UserId) -> CoinTransfer {
        CoinTransfer {
            from_user_id: sender,
            to_user_id: self.to_user_id,
            amount: self.amount,
            note: self.note,
        }
    }
}

/// POST /api/rewards/grant
pub type GrantRequest = CoinGrant;

/// POST /api/audit/events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventRequest {
    /// Domain object type.
    pub entity_type: String,
    /// Domain object id.
    #[serde(default)]
    pub entity_id: Option<String>,
    /// Dotted event name.
    pub event_type: String,
    /// Defaults to `info`.
    #[serde(default)]
    pub severity: Option<AuditSeverity>,
    /// Message.
    #[serde(default)]
    pub message: Option<String>,
    /// Affected user.
    #[serde(default)]
    pub target_user_id: Option<UserId>,
    /// Correlated idempotency key.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// Structured payload.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl AuditEventRequest {
    /// Convert into the entity-level create payload.
    pub fn into_event(self) -> CreateAuditEvent {
        let mut event = CreateAuditEvent::new(self.entity_type, self.event_type)
            .users(None, self.target_user_id)
            .entity_id(self.entity_id)
            .severity(self.severity.unwrap_or(AuditSeverity::Info))
            .correlation(None, self.idempotency_key);
        if let Some(message) = self.message {
            event = event.message(message);
        }
        if let Some(metadata) = self.metadata {
            event = event.metadata(metadata);
        }
        event
    }
}

/// GET /api/audit/events query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    /// Idempotency key to correlate on.
    pub idempotency_key: String,
}
