//! Audit ledger handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;

use coinvault_entity::audit::AuditEvent;

use crate::dto::request::{AuditEventRequest, AuditQuery};
use crate::dto::response::ApiResponse;
use crate::error::ApiResult;
use crate::extractors::Caller;
use crate::state::AppState;

/// POST /api/audit/events
pub async fn append_event(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<AuditEventRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AuditEvent>>)> {
    let event = state
        .audit
        .append_audit_event(&caller, req.into_event())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(event))))
}

/// GET /api/audit/events?idempotencyKey=...
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<ApiResponse<Vec<AuditEvent>>>> {
    let events = state.audit.events_for_key(&query.idempotency_key).await?;
    Ok(Json(ApiResponse::ok(events)))
}
