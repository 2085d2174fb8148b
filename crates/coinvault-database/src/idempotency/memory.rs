//! In-process idempotency store.
//!
//! Each `(scope, key)` entry is mutated under its DashMap shard lock, which
//! gives the same single-winner guarantees as the conditional SQL updates.
//! Records do not survive a restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use coinvault_core::error::AppError;
use coinvault_core::result::AppResult;
use coinvault_entity::idempotency::{
    IdempotencyRecord, IdempotencyStatus, NewAttempt, RecordOutcome,
};

use super::IdempotencyStore;

type RecordKey = (String, String);

/// DashMap-backed [`IdempotencyStore`].
#[derive(Debug, Default)]
pub struct MemoryIdempotencyStore {
    records: DashMap<RecordKey, IdempotencyRecord>,
}

impl MemoryIdempotencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Overwrite a record's claim expiry. Used to simulate a crashed owner.
    pub fn set_locked_until(&self, scope: &str, key: &str, locked_until: Option<DateTime<Utc>>) {
        if let Some(mut record) = self.records.get_mut(&record_key(scope, key)) {
            record.locked_until = locked_until;
        }
    }
}

fn record_key(scope: &str, key: &str) -> RecordKey {
    (scope.to_string(), key.to_string())
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn create_if_absent(&self, attempt: &NewAttempt) -> AppResult<(IdempotencyRecord, bool)> {
        let now = Utc::now();
        match self
            .records
            .entry(record_key(&attempt.scope, &attempt.idempotency_key))
        {
            Entry::Occupied(mut entry) => {
                entry.get_mut().last_seen_at = now;
                Ok((entry.get().clone(), false))
            }
            Entry::Vacant(entry) => {
                let record = IdempotencyRecord {
                    id: attempt.id.clone(),
                    scope: attempt.scope.clone(),
                    idempotency_key: attempt.idempotency_key.clone(),
                    request_hash: attempt.request_hash.clone(),
                    status: IdempotencyStatus::InProgress,
                    attempt: 1,
                    locked_until: Some(attempt.locked_until),
                    response_code: None,
                    response_body: None,
                    resource_type: None,
                    resource_id: None,
                    created_at: now,
                    updated_at: now,
                    last_seen_at: now,
                };
                entry.insert(record.clone());
                Ok((record, true))
            }
        }
    }

    async fn find(&self, scope: &str, key: &str) -> AppResult<Option<IdempotencyRecord>> {
        Ok(self
            .records
            .get(&record_key(scope, key))
            .map(|r| r.value().clone()))
    }

    async fn update_result(&self, outcome: &RecordOutcome) -> AppResult<bool> {
        let mut record = self
            .records
            .get_mut(&record_key(&outcome.scope, &outcome.idempotency_key))
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Idempotency record {}/{} not found",
                    outcome.scope, outcome.idempotency_key
                ))
            })?;

        if record.status != IdempotencyStatus::InProgress || record.attempt != outcome.attempt {
            return Ok(false);
        }
        record.status = outcome.status;
        record.response_code = Some(outcome.response_code);
        record.response_body = Some(outcome.response_body.clone());
        record.resource_type = outcome.resource_type.clone();
        record.resource_id = outcome.resource_id.clone();
        record.locked_until = None;
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn reclaim(
        &self,
        scope: &str,
        key: &str,
        observed_attempt: i32,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<IdempotencyRecord>> {
        let Some(mut record) = self.records.get_mut(&record_key(scope, key)) else {
            return Ok(None);
        };
        let expired = record.locked_until.is_none_or(|until| until <= now);
        if record.status != IdempotencyStatus::InProgress
            || record.attempt != observed_attempt
            || !expired
        {
            return Ok(None);
        }
        record.attempt += 1;
        record.locked_until = Some(locked_until);
        record.updated_at = now;
        record.last_seen_at = now;
        Ok(Some(record.clone()))
    }

    async fn release(&self, scope: &str, key: &str, attempt: i32) -> AppResult<bool> {
        let Some(mut record) = self.records.get_mut(&record_key(scope, key)) else {
            return Ok(false);
        };
        if record.status != IdempotencyStatus::InProgress || record.attempt != attempt {
            return Ok(false);
        }
        record.locked_until = None;
        record.updated_at = Utc::now();
        Ok(true)
    }
}
