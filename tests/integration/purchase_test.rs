//! Integration tests for the seasonal store purchase flow.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use coinvault_core::error::codes;

fn lantern(quantity: i32) -> serde_json::Value {
    json!({ "itemKey": "lantern", "quantity": quantity, "unitPrice": 100 })
}

#[tokio::test]
async fn test_purchase_then_retry_replays() {
    let app = helpers::TestApp::new();
    let buyer = app.user_with_coins(500);

    let first = app
        .request("POST", "/api/store/purchase", Some(lantern(2)), Some(buyer), Some("buy-1"))
        .await;
    assert_eq!(first.status, StatusCode::CREATED, "{:?}", first.body);
    assert_eq!(first.body["success"], true);
    assert_eq!(first.body["replayed"], false);
    assert_eq!(first.body["itemKey"], "lantern");
    assert_eq!(first.body["spentCoins"], 200);
    assert_eq!(first.body["remainingCoins"], 300);

    let retry = app
        .request("POST", "/api/store/purchase", Some(lantern(2)), Some(buyer), Some("buy-1"))
        .await;
    assert_eq!(retry.status, StatusCode::OK);
    assert_eq!(retry.body["replayed"], true);
    assert_eq!(retry.body["entitlementId"], first.body["entitlementId"]);
    assert_eq!(retry.body["remainingCoins"], 300);

    assert_eq!(app.coins(buyer).await, 300);
    assert_eq!(app.ledger.entitlements(buyer).await.len(), 1);
}

#[tokio::test]
async fn test_missing_idempotency_key_is_rejected() {
    let app = helpers::TestApp::new();
    let buyer = app.user_with_coins(500);

    let response = app
        .request("POST", "/api/store/purchase", Some(lantern(1)), Some(buyer), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], codes::IDEMPOTENCY_KEY_REQUIRED);
    assert!(app.store.is_empty());
    assert_eq!(app.coins(buyer).await, 500);
}

#[tokio::test]
async fn test_missing_actor_is_rejected() {
    let app = helpers::TestApp::new();

    let response = app
        .request("POST", "/api/store/purchase", Some(lantern(1)), None, Some("buy-1"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], codes::ACTOR_REQUIRED);
}

#[tokio::test]
async fn test_key_reuse_with_different_payload_conflicts() {
    let app = helpers::TestApp::new();
    let buyer = app.user_with_coins(500);

    let first = app
        .request("POST", "/api/store/purchase", Some(lantern(1)), Some(buyer), Some("buy-1"))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app
        .request("POST", "/api/store/purchase", Some(lantern(3)), Some(buyer), Some("buy-1"))
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.body["error"], codes::IDEMPOTENCY_PAYLOAD_MISMATCH);
    assert_eq!(app.coins(buyer).await, 400);
}

#[tokio::test]
async fn test_insufficient_coins_failure_is_replayed() {
    let app = helpers::TestApp::new();
    let buyer = app.user_with_coins(150);

    let first = app
        .request("POST", "/api/store/purchase", Some(lantern(2)), Some(buyer), Some("buy-1"))
        .await;
    assert_eq!(first.status, StatusCode::CONFLICT);
    assert_eq!(first.body["success"], false);
    assert_eq!(first.body["replayed"], false);
    assert_eq!(first.body["error"], codes::INSUFFICIENT_COINS);

    // Topping up does not change the recorded answer for this key.
    app.ledger.seed(buyer, 1_000);

    let retry = app
        .request("POST", "/api/store/purchase", Some(lantern(2)), Some(buyer), Some("buy-1"))
        .await;
    assert_eq!(retry.status, StatusCode::CONFLICT);
    assert_eq!(retry.body["success"], false);
    assert_eq!(retry.body["replayed"], true);
    assert_eq!(retry.body["error"], first.body["error"]);
    assert_eq!(retry.body["message"], first.body["message"]);
    assert_eq!(app.coins(buyer).await, 1_000);
}

#[tokio::test]
async fn test_invalid_quantity_claims_no_key() {
    let app = helpers::TestApp::new();
    let buyer = app.user_with_coins(500);

    let response = app
        .request("POST", "/api/store/purchase", Some(lantern(0)), Some(buyer), Some("buy-1"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], codes::INVALID_QUANTITY);
    assert!(app.store.is_empty());

    let fixed = app
        .request("POST", "/api/store/purchase", Some(lantern(1)), Some(buyer), Some("buy-1"))
        .await;
    assert_eq!(fixed.status, StatusCode::CREATED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicates_debit_once() {
    let app = helpers::TestApp::new();
    let buyer = app.user_with_coins(1_000);

    let requests = (0..10).map(|_| {
        app.request("POST", "/api/store/purchase", Some(lantern(1)), Some(buyer), Some("race"))
    });
    let responses = futures::future::join_all(requests).await;

    let created = responses
        .iter()
        .filter(|r| r.status == StatusCode::CREATED)
        .count();
    assert_eq!(created, 1);
    for response in &responses {
        assert!(
            matches!(
                response.status,
                StatusCode::CREATED | StatusCode::OK | StatusCode::CONFLICT
            ),
            "{:?}",
            response
        );
        if response.status == StatusCode::CONFLICT {
            assert_eq!(response.body["error"], codes::IDEMPOTENCY_IN_PROGRESS);
        }
    }
    assert_eq!(app.coins(buyer).await, 900);
}

#[tokio::test]
async fn test_audit_trail_and_metrics() {
    let app = helpers::TestApp::new();
    let buyer = app.user_with_coins(500);

    for _ in 0..2 {
        app.request("POST", "/api/store/purchase", Some(lantern(1)), Some(buyer), Some("buy-7"))
            .await;
    }

    let events = app
        .request("GET", "/api/audit/events?idempotencyKey=buy-7", None, None, None)
        .await;
    assert_eq!(events.status, StatusCode::OK);
    let events = events.body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], "seasonal_purchase.succeeded");
    assert_eq!(events[0]["actor_user_id"], buyer.to_string());

    let metrics = app
        .request("GET", "/api/metrics/mutations", None, None, None)
        .await;
    assert_eq!(metrics.status, StatusCode::OK);
    let channel = &metrics.body["data"]["store.seasonal.purchase"];
    assert_eq!(channel["calls"], 2);
    assert_eq!(channel["succeeded"], 1);
    assert_eq!(channel["replayed"], 1);
}

#[tokio::test]
async fn test_health_reports_memory_backend() {
    let app = helpers::TestApp::new();
    let response = app.request("GET", "/health", None, None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["database"], "memory");
}
