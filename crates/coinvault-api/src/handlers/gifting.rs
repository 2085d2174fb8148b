//! Gifting handlers.

use axum::Json;
use axum::extract::State;

use crate::dto::request::TransferRequest;
use crate::dto::response::MutationResponse;
use crate::extractors::{Actor, IdempotencyKey};
use crate::state::AppState;

/// POST /api/gifts/transfer
///
/// The sender is always the authenticated user.
pub async fn transfer(
    State(state): State<AppState>,
    actor: Actor,
    key: IdempotencyKey,
    Json(req): Json<TransferRequest>,
) -> MutationResponse {
    let transfer = req.into_transfer(actor.user_id);
    let result = state
        .wallet
        .transfer(&actor.ctx, key.as_str(), transfer)
        .await;
    MutationResponse::from_result(result)
}
