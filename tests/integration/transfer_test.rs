//! Integration tests for gifting transfers, reward grants and wallet reads.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use coinvault_core::error::codes;
use coinvault_core::types::UserId;

fn gift(to: UserId, amount: i64) -> serde_json::Value {
    json!({ "toUserId": to, "amount": amount, "note": "happy birthday" })
}

#[tokio::test]
async fn test_transfer_moves_coins_once() {
    let app = helpers::TestApp::new();
    let alice = app.user_with_coins(300);
    let bob = app.user_with_coins(50);

    let first = app
        .request("POST", "/api/gifts/transfer", Some(gift(bob, 120)), Some(alice), Some("gift-1"))
        .await;
    assert_eq!(first.status, StatusCode::CREATED, "{:?}", first.body);
    assert_eq!(first.body["amount"], 120);
    assert_eq!(first.body["senderRemainingCoins"], 180);
    assert!(
        first.body["transferId"]
            .as_str()
            .is_some_and(|id| id.starts_with("xfer_"))
    );

    let retry = app
        .request("POST", "/api/gifts/transfer", Some(gift(bob, 120)), Some(alice), Some("gift-1"))
        .await;
    assert_eq!(retry.status, StatusCode::OK);
    assert_eq!(retry.body["replayed"], true);
    assert_eq!(retry.body["transferId"], first.body["transferId"]);

    assert_eq!(app.coins(alice).await, 180);
    assert_eq!(app.coins(bob).await, 170);
    assert_eq!(app.ledger.transfers().await.len(), 1);
}

#[tokio::test]
async fn test_self_transfer_is_rejected() {
    let app = helpers::TestApp::new();
    let alice = app.user_with_coins(300);

    let response = app
        .request("POST", "/api/gifts/transfer", Some(gift(alice, 10)), Some(alice), Some("gift-1"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], codes::SELF_TRANSFER_FORBIDDEN);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let app = helpers::TestApp::new();
    let alice = app.user_with_coins(300);
    let bob = app.user_with_coins(0);

    let response = app
        .request("POST", "/api/gifts/transfer", Some(gift(bob, 0)), Some(alice), Some("gift-1"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], codes::INVALID_AMOUNT);
}

#[tokio::test]
async fn test_unknown_recipient_failure_is_cached() {
    let app = helpers::TestApp::new();
    let alice = app.user_with_coins(300);
    let ghost = UserId::new();

    let first = app
        .request("POST", "/api/gifts/transfer", Some(gift(ghost, 10)), Some(alice), Some("gift-1"))
        .await;
    assert_eq!(first.status, StatusCode::NOT_FOUND);
    assert_eq!(first.body["error"], codes::USER_NOT_FOUND);

    let retry = app
        .request("POST", "/api/gifts/transfer", Some(gift(ghost, 10)), Some(alice), Some("gift-1"))
        .await;
    assert_eq!(retry.status, StatusCode::NOT_FOUND);
    assert_eq!(retry.body["replayed"], true);
    assert_eq!(app.coins(alice).await, 300);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_conserve_coins() {
    let app = Arc::new(helpers::TestApp::new());
    let alice = app.user_with_coins(1_000);
    let bob = app.user_with_coins(1_000);

    let mut handles = Vec::new();
    for i in 0..50 {
        let app = app.clone();
        let (from, to) = if i % 2 == 0 { (alice, bob) } else { (bob, alice) };
        handles.push(tokio::spawn(async move {
            app.request(
                "POST",
                "/api/gifts/transfer",
                Some(gift(to, 7)),
                Some(from),
                Some(&format!("opposing-{i}")),
            )
            .await
        }));
    }

    let all = futures::future::join_all(handles);
    let responses = tokio::time::timeout(Duration::from_secs(10), all)
        .await
        .expect("opposing transfers deadlocked");
    for response in responses {
        assert_eq!(response.unwrap().status, StatusCode::CREATED);
    }

    assert_eq!(app.coins(alice).await + app.coins(bob).await, 2_000);
    assert_eq!(app.coins(alice).await, 1_000);
}

#[tokio::test]
async fn test_grant_opens_wallet_without_actor() {
    let app = helpers::TestApp::new();
    let player = UserId::new();
    let body = json!({ "userId": player, "amount": 250, "reason": "season_pass_tier_5" });

    let first = app
        .request("POST", "/api/rewards/grant", Some(body.clone()), None, Some("grant-1"))
        .await;
    assert_eq!(first.status, StatusCode::CREATED, "{:?}", first.body);
    assert_eq!(first.body["balance"], 250);

    let retry = app
        .request("POST", "/api/rewards/grant", Some(body), None, Some("grant-1"))
        .await;
    assert_eq!(retry.status, StatusCode::OK);
    assert_eq!(app.coins(player).await, 250);
}

#[tokio::test]
async fn test_same_key_in_different_scopes_is_independent() {
    let app = helpers::TestApp::new();
    let alice = app.user_with_coins(500);
    let bob = app.user_with_coins(0);

    let transfer = app
        .request("POST", "/api/gifts/transfer", Some(gift(bob, 100)), Some(alice), Some("shared"))
        .await;
    assert_eq!(transfer.status, StatusCode::CREATED);

    let grant = app
        .request(
            "POST",
            "/api/rewards/grant",
            Some(json!({ "userId": bob, "amount": 5, "reason": "daily" })),
            None,
            Some("shared"),
        )
        .await;
    assert_eq!(grant.status, StatusCode::CREATED);
    assert_eq!(app.coins(bob).await, 105);
}

#[tokio::test]
async fn test_unknown_wallet_is_not_found() {
    let app = helpers::TestApp::new();
    let response = app
        .request("GET", &format!("/api/wallets/{}", UserId::new()), None, None, None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], codes::USER_NOT_FOUND);
}

#[tokio::test]
async fn test_standalone_audit_event() {
    let app = helpers::TestApp::new();
    let operator = UserId::new();

    let response = app
        .request(
            "POST",
            "/api/audit/events",
            Some(json!({
                "entityType": "currency",
                "eventType": "currency.adjustment",
                "message": "manual correction",
                "idempotencyKey": "support-ticket-88",
            })),
            Some(operator),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    assert_eq!(response.body["data"]["actor_user_id"], operator.to_string());
    assert_eq!(app.audit.len().await, 1);

    let blank = app
        .request(
            "POST",
            "/api/audit/events",
            Some(json!({ "entityType": " ", "eventType": "x" })),
            None,
            None,
        )
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
}
