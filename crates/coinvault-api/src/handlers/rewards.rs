//! Reward handlers.

use axum::Json;
use axum::extract::State;

use crate::dto::request::GrantRequest;
use crate::dto::response::MutationResponse;
use crate::extractors::{Caller, IdempotencyKey};
use crate::state::AppState;

/// POST /api/rewards/grant
///
/// Called by internal reward jobs, so the actor header is optional.
pub async fn grant(
    State(state): State<AppState>,
    caller: Caller,
    key: IdempotencyKey,
    Json(req): Json<GrantRequest>,
) -> MutationResponse {
    let result = state.wallet.grant(&caller, key.as_str(), req).await;
    MutationResponse::from_result(result)
}
