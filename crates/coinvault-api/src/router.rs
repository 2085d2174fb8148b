//! Route definitions for the CoinVault HTTP API.
//!
//! Mutating routes live under `/api` and require an idempotency key; the
//! health probe sits at the root.

use std::time::Duration;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.server.request_timeout_seconds.max(1));

    let api_routes = Router::new()
        .merge(store_routes())
        .merge(gifting_routes())
        .merge(reward_routes())
        .merge(wallet_routes())
        .merge(audit_routes())
        .merge(metrics_routes());

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health::health))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

fn store_routes() -> Router<AppState> {
    Router::new().route("/store/purchase", post(handlers::store::purchase))
}

fn gifting_routes() -> Router<AppState> {
    Router::new().route("/gifts/transfer", post(handlers::gifting::transfer))
}

fn reward_routes() -> Router<AppState> {
    Router::new().route("/rewards/grant", post(handlers::rewards::grant))
}

fn wallet_routes() -> Router<AppState> {
    Router::new().route("/wallets/{user_id}", get(handlers::wallet::get_wallet))
}

/// Standalone audit records and per-key lookups
fn audit_routes() -> Router<AppState> {
    Router::new().route(
        "/audit/events",
        get(handlers::audit::list_events).post(handlers::audit::append_event),
    )
}

fn metrics_routes() -> Router<AppState> {
    Router::new().route(
        "/metrics/mutations",
        get(handlers::metrics::mutation_metrics),
    )
}
