//! Application state shared across all handlers.

use std::sync::Arc;

use coinvault_core::config::ServerConfig;
use coinvault_database::DatabasePool;
use coinvault_service::{AuditService, MutationMetrics, WalletService};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// HTTP server settings
    pub server: Arc<ServerConfig>,

    // ── Infrastructure ───────────────────────────────────────
    /// PostgreSQL pool; `None` when running on in-memory stores
    pub db: Option<DatabasePool>,
    /// Executor metrics
    pub metrics: Arc<MutationMetrics>,

    // ── Services ─────────────────────────────────────────────
    /// Wallet mutations and reads
    pub wallet: Arc<WalletService>,
    /// Standalone audit records
    pub audit: Arc<AuditService>,
}
