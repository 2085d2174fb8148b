//! Behavioural tests for the idempotent mutation executor, run against the
//! in-memory idempotency store and audit ledger.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::Notify;

use coinvault_core::config::{IdempotencyConfig, StaleLockPolicy};
use coinvault_core::error::{codes, AppError};
use coinvault_core::types::new_id;
use coinvault_database::audit::{AuditSink, MemoryAuditLog};
use coinvault_database::idempotency::{IdempotencyStore, MemoryIdempotencyStore};
use coinvault_entity::audit::AuditSeverity;
use coinvault_entity::idempotency::{IdempotencyStatus, NewAttempt};
use coinvault_entity::mutation::{MutationAttempt, MutationResult};
use coinvault_service::metrics::MutationMetrics;
use coinvault_service::mutation::{MutationExecutor, MutationRequest, request_hash};

const SCOPE: &str = "store.seasonal.purchase";

struct Harness {
    store: Arc<MemoryIdempotencyStore>,
    audit: Arc<MemoryAuditLog>,
    metrics: Arc<MutationMetrics>,
    executor: Arc<MutationExecutor>,
}

fn harness(config: IdempotencyConfig) -> Harness {
    let store = Arc::new(MemoryIdempotencyStore::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let metrics = Arc::new(MutationMetrics::new());
    let executor = Arc::new(MutationExecutor::new(
        store.clone(),
        audit.clone(),
        metrics.clone(),
        config,
    ));
    Harness {
        store,
        audit,
        metrics,
        executor,
    }
}

fn payload() -> Value {
    json!({"userId": "u1", "itemKey": "lantern", "quantity": 1, "unitPrice": 100})
}

fn request(key: &str, payload: Value) -> MutationRequest {
    MutationRequest::new(SCOPE, key).payload(payload)
}

/// Insert a record as if another process had claimed it.
async fn preclaim(store: &MemoryIdempotencyStore, key: &str, payload: &Value, expired: bool) {
    let offset = chrono::Duration::seconds(30);
    let locked_until = if expired {
        Utc::now() - offset
    } else {
        Utc::now() + offset
    };
    store
        .create_if_absent(&NewAttempt {
            id: new_id("idem"),
            scope: SCOPE.into(),
            idempotency_key: key.into(),
            request_hash: request_hash(Some(payload)).unwrap(),
            locked_until,
        })
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_calls_execute_once() {
    let h = harness(IdempotencyConfig::default());
    let runs = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let executor = h.executor.clone();
        let runs = runs.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let runs = runs.clone();
                let result = executor
                    .execute(request("K1", payload()), move |_attempt| async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(MutationResult::new(json!({"remainingCoins": 50})))
                    })
                    .await;
                match result {
                    Err(e) if e.code() == codes::IDEMPOTENCY_IN_PROGRESS => {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    other => return other.unwrap(),
                }
            }
        }));
    }

    let outcomes = futures::future::join_all(handles).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let bodies: Vec<Value> = outcomes
        .into_iter()
        .map(|o| o.unwrap().response_body)
        .collect();
    assert!(bodies.iter().all(|b| b == &json!({"remainingCoins": 50})));
    assert_eq!(h.audit.len().await, 1);
}

#[tokio::test]
async fn test_payload_mismatch_does_not_execute() {
    let h = harness(IdempotencyConfig::default());
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = runs.clone();
    h.executor
        .execute(request("K1", payload()), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(MutationResult::new(json!({"ok": true})))
        })
        .await
        .unwrap();

    let counter = runs.clone();
    let err = h
        .executor
        .execute(
            request("K1", json!({"userId": "u1", "itemKey": "mask", "quantity": 1, "unitPrice": 100})),
            move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(MutationResult::new(json!({"ok": true})))
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), codes::IDEMPOTENCY_PAYLOAD_MISMATCH);
    assert_eq!(err.kind.http_status(), 409);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let record = h.store.find(SCOPE, "K1").await.unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Succeeded);
    assert_eq!(record.response_body, Some(json!({"ok": true})));
}

#[tokio::test]
async fn test_key_order_in_payload_is_not_a_mismatch() {
    let h = harness(IdempotencyConfig::default());
    h.executor
        .execute(request("K1", json!({"a": 1, "b": 2})), |_| async {
            Ok(MutationResult::new(json!({"n": 1})))
        })
        .await
        .unwrap();

    let replay = h
        .executor
        .execute(request("K1", json!({"b": 2, "a": 1})), |_| async {
            Ok(MutationResult::new(json!({"n": 2})))
        })
        .await
        .unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.response_body, json!({"n": 1}));
}

#[tokio::test]
async fn test_replay_returns_identical_body() {
    let h = harness(IdempotencyConfig::default());
    let body = json!({"itemKey": "lantern", "spentCoins": 100, "remainingCoins": 50});

    let first_body = body.clone();
    let first = h
        .executor
        .execute(request("K1", payload()), move |_| async move {
            Ok(MutationResult {
                body: first_body,
                resource_type: Some("seasonal_purchase".into()),
                resource_id: Some("u1:lantern".into()),
            })
        })
        .await
        .unwrap();
    assert!(!first.replayed);
    assert_eq!(first.response_code, 200);

    let second = h
        .executor
        .execute(request("K1", payload()), |_| async {
            panic!("unit of work must not run on replay")
        })
        .await
        .unwrap();

    assert!(second.replayed);
    assert_eq!(second.status, IdempotencyStatus::Succeeded);
    assert_eq!(second.response_body, first.response_body);
    assert_eq!(second.resource_id.as_deref(), Some("u1:lantern"));
    // Replays add no audit events.
    assert_eq!(h.audit.len().await, 1);
}

#[tokio::test]
async fn test_domain_failure_is_cached() {
    let h = harness(IdempotencyConfig::default());
    let balance = Arc::new(AtomicUsize::new(50));
    let runs = Arc::new(AtomicUsize::new(0));

    let attempt = |balance: Arc<AtomicUsize>, runs: Arc<AtomicUsize>| {
        move |_: MutationAttempt| async move {
            runs.fetch_add(1, Ordering::SeqCst);
            if balance.load(Ordering::SeqCst) < 100 {
                return Err(AppError::conflict("Insufficient coins")
                    .with_code(codes::INSUFFICIENT_COINS));
            }
            Ok(MutationResult::new(json!({"ok": true})))
        }
    };

    let err = h
        .executor
        .execute(request("K1", payload()), attempt(balance.clone(), runs.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::INSUFFICIENT_COINS);

    // The condition is fixed, but the key keeps its recorded answer.
    balance.store(500, Ordering::SeqCst);
    let replay = h
        .executor
        .execute(request("K1", payload()), attempt(balance.clone(), runs.clone()))
        .await
        .unwrap();

    assert!(replay.replayed);
    assert_eq!(replay.status, IdempotencyStatus::Failed);
    assert_eq!(replay.response_code, 409);
    assert_eq!(replay.response_body["error"], "INSUFFICIENT_COINS");
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let events = h.audit.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "store.seasonal.purchase.failed");
    assert_eq!(events[0].severity, AuditSeverity::Error);
}

#[tokio::test]
async fn test_live_claim_returns_in_progress() {
    let h = harness(IdempotencyConfig::default());
    preclaim(&h.store, "K1", &payload(), false).await;

    let err = h
        .executor
        .execute(request("K1", payload()), |_| async {
            panic!("unit of work must not run while another attempt holds the key")
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), codes::IDEMPOTENCY_IN_PROGRESS);
    assert_eq!(err.kind.http_status(), 409);
    assert_eq!(h.metrics.channel(SCOPE).unwrap().conflicts, 1);
}

#[tokio::test]
async fn test_stale_claim_is_reclaimed_with_new_token() {
    let h = harness(IdempotencyConfig::default());
    preclaim(&h.store, "K1", &payload(), true).await;

    let outcome = h
        .executor
        .execute(request("K1", payload()), |attempt| async move {
            assert_eq!(attempt.attempt, 2);
            Ok(MutationResult::new(json!({"attempt": attempt.attempt})))
        })
        .await
        .unwrap();
    assert!(!outcome.replayed);

    // The crashed owner's late write is fenced off.
    let late = coinvault_entity::idempotency::RecordOutcome {
        scope: SCOPE.into(),
        idempotency_key: "K1".into(),
        attempt: 1,
        status: IdempotencyStatus::Failed,
        response_code: 500,
        response_body: json!({"error": "LATE"}),
        resource_type: None,
        resource_id: None,
    };
    assert!(!h.store.update_result(&late).await.unwrap());
    let record = h.store.find(SCOPE, "K1").await.unwrap().unwrap();
    assert_eq!(record.response_body, Some(json!({"attempt": 2})));
}

#[tokio::test]
async fn test_stale_claim_rejected_under_reject_policy() {
    let h = harness(IdempotencyConfig {
        stale_lock_policy: StaleLockPolicy::Reject,
        ..IdempotencyConfig::default()
    });
    preclaim(&h.store, "K1", &payload(), true).await;

    let err = h
        .executor
        .execute(request("K1", payload()), |_| async {
            panic!("reject policy must not re-run a stale attempt")
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::IDEMPOTENCY_IN_PROGRESS);

    let record = h.store.find(SCOPE, "K1").await.unwrap().unwrap();
    assert_eq!(record.attempt, 1);
    assert_eq!(record.status, IdempotencyStatus::InProgress);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reclaimers_have_single_winner() {
    let h = harness(IdempotencyConfig::default());
    preclaim(&h.store, "K1", &payload(), true).await;
    let runs = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let executor = h.executor.clone();
        let runs = runs.clone();
        handles.push(tokio::spawn(async move {
            executor
                .execute(request("K1", payload()), move |_| async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(MutationResult::new(json!({"ok": true})))
                })
                .await
        }));
    }

    let mut executed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) if !outcome.replayed => executed += 1,
            Ok(_) => {}
            Err(e) => assert_eq!(e.code(), codes::IDEMPOTENCY_IN_PROGRESS),
        }
    }
    assert_eq!(executed, 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retryable_failure_releases_the_key() {
    let h = harness(IdempotencyConfig::default());
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = runs.clone();
    let err = h
        .executor
        .execute(request("K1", payload()), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::service_unavailable("deadlock detected").with_code(codes::LOCK_TIMEOUT))
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::LOCK_TIMEOUT);

    let record = h.store.find(SCOPE, "K1").await.unwrap().unwrap();
    assert!(record.is_released());

    let counter = runs.clone();
    let outcome = h
        .executor
        .execute(request("K1", payload()), move |attempt| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(MutationResult::new(json!({"attempt": attempt.attempt})))
        })
        .await
        .unwrap();

    assert!(!outcome.replayed);
    assert_eq!(outcome.response_body, json!({"attempt": 2}));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_superseded_attempt_returns_recorded_outcome() {
    let h = harness(IdempotencyConfig::default());
    let executor = h.executor.clone();
    let store = h.store.clone();

    let outcome = h
        .executor
        .execute(request("K1", payload()), move |_| async move {
            // Simulate a stall long enough for the claim to expire and a
            // retry to take the record over and finish.
            store.set_locked_until(SCOPE, "K1", Some(Utc::now() - chrono::Duration::seconds(1)));
            let retry = executor
                .execute(request("K1", payload()), |_| async {
                    Ok(MutationResult::new(json!({"winner": "retry"})))
                })
                .await
                .unwrap();
            assert!(!retry.replayed);
            Ok(MutationResult::new(json!({"winner": "original"})))
        })
        .await
        .unwrap();

    assert!(outcome.replayed);
    assert_eq!(outcome.response_body, json!({"winner": "retry"}));
    // Only the attempt that owns the record is audited.
    assert_eq!(h.audit.len().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_superseded_attempt_finishing_first_gets_in_progress() {
    let h = harness(IdempotencyConfig::default());
    let expired = Arc::new(Notify::new());
    let retry_running = Arc::new(Notify::new());
    let release_retry = Arc::new(Notify::new());

    let original = {
        let executor = h.executor.clone();
        let store = h.store.clone();
        let expired = expired.clone();
        let retry_running = retry_running.clone();
        tokio::spawn(async move {
            executor
                .execute(request("K1", payload()), move |_| async move {
                    store.set_locked_until(SCOPE, "K1", Some(Utc::now() - chrono::Duration::seconds(1)));
                    expired.notify_one();
                    retry_running.notified().await;
                    Ok(MutationResult::new(json!({"winner": "original"})))
                })
                .await
        })
    };

    expired.notified().await;
    let retry = {
        let executor = h.executor.clone();
        let retry_running = retry_running.clone();
        let release_retry = release_retry.clone();
        tokio::spawn(async move {
            executor
                .execute(request("K1", payload()), move |attempt| async move {
                    assert_eq!(attempt.attempt, 2);
                    retry_running.notify_one();
                    release_retry.notified().await;
                    Ok(MutationResult::new(json!({"winner": "retry"})))
                })
                .await
        })
    };

    // The original returns while the retry still holds the record.
    let err = original.await.unwrap().unwrap_err();
    assert_eq!(err.code(), codes::IDEMPOTENCY_IN_PROGRESS);

    release_retry.notify_one();
    let fresh = retry.await.unwrap().unwrap();
    assert!(!fresh.replayed);
    assert_eq!(fresh.response_body, json!({"winner": "retry"}));

    let replay = h
        .executor
        .execute(request("K1", payload()), |_| async {
            panic!("unit of work must not run on replay")
        })
        .await
        .unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.response_body, fresh.response_body);
    assert_eq!(h.audit.len().await, 1);
    assert_eq!(h.metrics.channel(SCOPE).unwrap().conflicts, 1);
}

#[tokio::test]
async fn test_lost_fencing_token_returns_winning_outcome() {
    let h = harness(IdempotencyConfig::default());
    let executor = h.executor.clone();
    let store = h.store.clone();

    let outcome = h
        .executor
        .execute(request("K1", payload()), move |_| async move {
            store.set_locked_until(SCOPE, "K1", Some(Utc::now() - chrono::Duration::seconds(1)));
            executor
                .execute(request("K1", payload()), |_| async {
                    Ok(MutationResult::new(json!({"winner": "retry"})))
                })
                .await
                .unwrap();
            Err(AppError::conflict("Attempt superseded").with_code(codes::FENCING_TOKEN_LOST))
        })
        .await
        .unwrap();

    assert!(outcome.replayed);
    assert_eq!(outcome.status, IdempotencyStatus::Succeeded);
    assert_eq!(outcome.response_body, json!({"winner": "retry"}));

    let events = h.audit.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "store.seasonal.purchase.succeeded");
}

#[tokio::test]
async fn test_superseded_domain_failure_is_not_recorded() {
    let h = harness(IdempotencyConfig::default());
    let executor = h.executor.clone();
    let store = h.store.clone();

    let outcome = h
        .executor
        .execute(request("K1", payload()), move |_| async move {
            store.set_locked_until(SCOPE, "K1", Some(Utc::now() - chrono::Duration::seconds(1)));
            executor
                .execute(request("K1", payload()), |_| async {
                    Ok(MutationResult::new(json!({"winner": "retry"})))
                })
                .await
                .unwrap();
            Err(AppError::conflict("Insufficient coins").with_code(codes::INSUFFICIENT_COINS))
        })
        .await
        .unwrap();

    assert!(outcome.replayed);
    assert_eq!(outcome.response_body, json!({"winner": "retry"}));
    let record = h.store.find(SCOPE, "K1").await.unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Succeeded);
    assert_eq!(record.attempt, 2);
}

#[tokio::test]
async fn test_audit_failure_does_not_mask_outcome() {
    let h = harness(IdempotencyConfig::default());
    h.audit.set_unavailable(true);

    let outcome = h
        .executor
        .execute(request("K1", payload()), |_| async {
            Ok(MutationResult::new(json!({"ok": true})))
        })
        .await
        .unwrap();
    assert!(!outcome.replayed);

    let record = h.store.find(SCOPE, "K1").await.unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Succeeded);

    let stats = h.metrics.channel(SCOPE).unwrap();
    assert_eq!(stats.audit_failures, 1);
    assert_eq!(stats.succeeded, 1);
}

#[tokio::test]
async fn test_audit_event_carries_correlation() {
    let h = harness(IdempotencyConfig::default());
    let actor = coinvault_core::types::UserId::new();

    h.executor
        .execute(
            request("K1", payload())
                .users(Some(actor), Some(actor))
                .entity("seasonal_store_item", Some("lantern".into()))
                .event_type("seasonal_purchase")
                .request_id(Some("req-7".into())),
            |_| async { Ok(MutationResult::new(json!({"ok": true}))) },
        )
        .await
        .unwrap();

    let events = h.audit.list_by_idempotency_key("K1").await.unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.event_type, "seasonal_purchase.succeeded");
    assert_eq!(event.entity_type, "seasonal_store_item");
    assert_eq!(event.entity_id.as_deref(), Some("lantern"));
    assert_eq!(event.actor_user_id, Some(actor));
    assert_eq!(event.request_id.as_deref(), Some("req-7"));
}

#[tokio::test]
async fn test_invalid_key_is_rejected_before_store() {
    let h = harness(IdempotencyConfig::default());

    let err = h
        .executor
        .execute(MutationRequest::new(SCOPE, "   "), |_| async {
            panic!("invalid requests never execute")
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), codes::INVALID_IDEMPOTENCY_KEY);
    assert!(h.store.is_empty());
    assert_eq!(h.metrics.channel(SCOPE).unwrap().rejected, 1);
}

#[tokio::test]
async fn test_missing_payload_is_distinct_from_a_payload() {
    let h = harness(IdempotencyConfig::default());

    h.executor
        .execute(MutationRequest::new(SCOPE, "K1"), |_| async {
            Ok(MutationResult::new(json!({"ok": true})))
        })
        .await
        .unwrap();

    let replay = h
        .executor
        .execute(MutationRequest::new(SCOPE, "K1"), |_| async {
            Ok(MutationResult::new(json!({"ok": false})))
        })
        .await
        .unwrap();
    assert!(replay.replayed);

    let err = h
        .executor
        .execute(request("K1", payload()), |_| async {
            Ok(MutationResult::new(json!({"ok": false})))
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::IDEMPOTENCY_PAYLOAD_MISMATCH);
}

#[tokio::test]
async fn test_same_key_in_different_scopes_is_independent() {
    let h = harness(IdempotencyConfig::default());

    for scope in ["gifting.transfer", "rewards.grant"] {
        let outcome = h
            .executor
            .execute(MutationRequest::new(scope, "K1"), move |_| async move {
                Ok(MutationResult::new(json!({"scope": scope})))
            })
            .await
            .unwrap();
        assert!(!outcome.replayed);
    }
    assert_eq!(h.store.len(), 2);
}
