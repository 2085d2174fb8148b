//! Mutation metrics handler.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;

use coinvault_service::ChannelSnapshot;

use crate::dto::response::ApiResponse;
use crate::state::AppState;

/// GET /api/metrics/mutations
pub async fn mutation_metrics(
    State(state): State<AppState>,
) -> Json<ApiResponse<BTreeMap<String, ChannelSnapshot>>> {
    Json(ApiResponse::ok(state.metrics.snapshot()))
}
