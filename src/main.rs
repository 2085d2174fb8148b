//! CoinVault Server: idempotent virtual-economy mutations
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use coinvault_core::config::AppConfig;
use coinvault_core::error::AppError;
use coinvault_database::{
    AuditLogRepository, DatabasePool, IdempotencyRepository, PgWalletLedger,
};
use coinvault_service::{AuditService, MutationExecutor, MutationMetrics, WalletService};

/// How often the stale-claim monitor scans `idempotency_keys`.
const STALE_SCAN_INTERVAL: Duration = Duration::from_secs(60);
/// Upper bound of records reported per scan.
const STALE_SCAN_LIMIT: i64 = 100;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file, environment overlay and env vars
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("COINVAULT_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("COINVAULT_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&config_path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting CoinVault v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;

    tracing::info!("Running database migrations...");
    coinvault_database::migration::run_migrations(db.pool()).await?;
    tracing::info!("Database migrations complete");

    // ── Step 2: Initialize repositories ──────────────────────────
    let idempotency_repo = Arc::new(IdempotencyRepository::new(db.pool().clone()));
    let audit_repo = Arc::new(AuditLogRepository::new(db.pool().clone()));
    let ledger = Arc::new(PgWalletLedger::new(db.pool().clone()));

    // ── Step 3: Mutation engine ──────────────────────────────────
    let metrics = Arc::new(MutationMetrics::new());
    let executor = Arc::new(MutationExecutor::new(
        idempotency_repo.clone(),
        audit_repo.clone(),
        metrics.clone(),
        config.idempotency.clone(),
    ));
    tracing::info!(
        lock_duration_ms = config.idempotency.lock_duration_ms,
        stale_lock_policy = ?config.idempotency.stale_lock_policy,
        "Mutation executor initialized"
    );

    // ── Step 4: Services ─────────────────────────────────────────
    let wallet = Arc::new(WalletService::new(executor, ledger));
    let audit = Arc::new(AuditService::new(audit_repo));

    // ── Step 5: Shutdown channel + stale-claim monitor ───────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_handle = tokio::spawn(monitor_stale_claims(idempotency_repo, shutdown_rx));

    // ── Step 6: Build and start HTTP server ──────────────────────
    let app_state = coinvault_api::AppState {
        server: Arc::new(config.server.clone()),
        db: Some(db.clone()),
        metrics,
        wallet,
        audit,
    };
    let app = coinvault_api::build_router(app_state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("CoinVault server listening on {}", addr);

    // ── Step 7: Graceful shutdown ────────────────────────────────
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // ── Step 8: Wait for background tasks ────────────────────────
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let _ = tokio::time::timeout(grace, monitor_handle).await;
    db.close().await;

    tracing::info!("CoinVault server shut down gracefully");
    Ok(())
}

/// Periodically report `in_progress` records whose claim has expired.
///
/// These are attempts that crashed or hung after claiming their key. They
/// are reclaimed on the next retry under the `reclaim` policy; under
/// `reject` they stay blocked until an operator resolves them.
async fn monitor_stale_claims(
    repo: Arc<IdempotencyRepository>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(STALE_SCAN_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        match repo.find_stale(chrono::Utc::now(), STALE_SCAN_LIMIT).await {
            Ok(stale) if stale.is_empty() => {}
            Ok(stale) => {
                for record in &stale {
                    tracing::warn!(
                        scope = %record.scope,
                        idempotency_key = %record.idempotency_key,
                        attempt = record.attempt,
                        locked_until = ?record.locked_until,
                        "Stale in-progress idempotency record"
                    );
                }
            }
            Err(e) => tracing::error!(error = %e, "Stale claim scan failed"),
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
