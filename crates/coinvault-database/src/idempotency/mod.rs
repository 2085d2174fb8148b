//! Durable idempotency records.
//!
//! The store is the single source of truth for "has this `(scope, key)`
//! already been executed". Every write that changes ownership or outcome is
//! conditional on the fencing token, so an attempt that lost its claim can
//! never overwrite the record.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use coinvault_core::result::AppResult;
use coinvault_entity::idempotency::{IdempotencyRecord, NewAttempt, RecordOutcome};

pub use memory::MemoryIdempotencyStore;
pub use postgres::IdempotencyRepository;

/// Storage contract for idempotency records.
#[async_trait]
pub trait IdempotencyStore: Send + Sync + fmt::Debug {
    /// Insert an `in_progress` record, or return the existing one.
    ///
    /// The flag is `true` only for the caller whose insert created the row.
    /// Under any number of concurrent callers exactly one sees `true`. An
    /// existing row has its `last_seen_at` refreshed.
    async fn create_if_absent(&self, attempt: &NewAttempt) -> AppResult<(IdempotencyRecord, bool)>;

    /// Fetch a record.
    async fn find(&self, scope: &str, key: &str) -> AppResult<Option<IdempotencyRecord>>;

    /// Write a terminal outcome.
    ///
    /// Applies only while the record is `in_progress` with
    /// `attempt == outcome.attempt`; returns whether it was applied. A
    /// missing record is an error.
    async fn update_result(&self, outcome: &RecordOutcome) -> AppResult<bool>;

    /// Take over an `in_progress` record whose claim expired or was released.
    ///
    /// Succeeds for at most one caller per observed attempt: the winner gets
    /// the record back with `attempt` bumped and a fresh `locked_until`.
    async fn reclaim(
        &self,
        scope: &str,
        key: &str,
        observed_attempt: i32,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<IdempotencyRecord>>;

    /// Give up the claim after a retryable failure so the next caller can
    /// reclaim immediately. Fenced like [`update_result`](Self::update_result).
    async fn release(&self, scope: &str, key: &str, attempt: i32) -> AppResult<bool>;
}
