//! Wallet read handlers.

use axum::Json;
use axum::extract::{Path, State};

use coinvault_core::types::UserId;

use crate::dto::response::{ApiResponse, WalletResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/wallets/{user_id}
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<ApiResponse<WalletResponse>>> {
    let wallet = state.wallet.balance(user_id).await?;
    Ok(Json(ApiResponse::ok(WalletResponse::from(wallet))))
}
