//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use coinvault_core::config::{IdempotencyConfig, ServerConfig};
use coinvault_core::types::UserId;
use coinvault_database::{MemoryAuditLog, MemoryIdempotencyStore, MemoryWalletLedger};
use coinvault_service::{AuditService, MutationExecutor, MutationMetrics, WalletService};

/// Test application backed by in-memory stores
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Wallet rows, for seeding and assertions
    pub ledger: Arc<MemoryWalletLedger>,
    /// Idempotency records
    pub store: Arc<MemoryIdempotencyStore>,
    /// Audit ledger
    pub audit: Arc<MemoryAuditLog>,
    /// Executor metrics
    pub metrics: Arc<MutationMetrics>,
}

impl TestApp {
    /// Create a new test application with default engine settings
    pub fn new() -> Self {
        Self::with_config(IdempotencyConfig::default())
    }

    /// Create a new test application with custom engine settings
    pub fn with_config(config: IdempotencyConfig) -> Self {
        let store = Arc::new(MemoryIdempotencyStore::new());
        let ledger = Arc::new(MemoryWalletLedger::new(store.clone()));
        let audit = Arc::new(MemoryAuditLog::new());
        let metrics = Arc::new(MutationMetrics::new());

        let executor = Arc::new(MutationExecutor::new(
            store.clone(),
            audit.clone(),
            metrics.clone(),
            config,
        ));

        let state = coinvault_api::AppState {
            server: Arc::new(ServerConfig::default()),
            db: None,
            metrics: metrics.clone(),
            wallet: Arc::new(WalletService::new(executor, ledger.clone())),
            audit: Arc::new(AuditService::new(audit.clone())),
        };

        Self {
            router: coinvault_api::build_router(state),
            ledger,
            store,
            audit,
            metrics,
        }
    }

    /// Open a wallet with a starting balance
    pub fn user_with_coins(&self, coins: i64) -> UserId {
        let user = UserId::new();
        self.ledger.seed(user, coins);
        user
    }

    /// Current balance as reported by the wallet endpoint
    pub async fn coins(&self, user: UserId) -> i64 {
        let response = self
            .request("GET", &format!("/api/wallets/{user}"), None, None, None)
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body["data"]["coins"]
            .as_i64()
            .expect("coins should be a number")
    }

    /// Make a request to the test app
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        actor: Option<UserId>,
        idempotency_key: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(actor) = actor {
            req = req.header("x-user-id", actor.to_string());
        }
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}
