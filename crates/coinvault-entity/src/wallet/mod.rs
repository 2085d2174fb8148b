//! Wallet, entitlement, and balance-mutation request/receipt entities.

pub mod model;

pub use model::{
    CoinGrant, CoinTransfer, Entitlement, GrantReceipt, PurchaseOrder, PurchaseReceipt,
    TransferReceipt, Wallet, MAX_PURCHASE_QUANTITY,
};
