//! Seasonal store handlers.

use axum::Json;
use axum::extract::State;

use crate::dto::request::PurchaseRequest;
use crate::dto::response::MutationResponse;
use crate::extractors::{Actor, IdempotencyKey};
use crate::state::AppState;

/// POST /api/store/purchase
pub async fn purchase(
    State(state): State<AppState>,
    actor: Actor,
    key: IdempotencyKey,
    Json(req): Json<PurchaseRequest>,
) -> MutationResponse {
    let order = req.into_order(actor.user_id);
    let result = state
        .wallet
        .purchase(&actor.ctx, key.as_str(), order)
        .await;
    MutationResponse::from_result(result)
}
