//! PostgreSQL idempotency store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};

use coinvault_core::error::AppError;
use coinvault_core::result::AppResult;
use coinvault_entity::idempotency::{IdempotencyRecord, NewAttempt, RecordOutcome};

use super::IdempotencyStore;
use crate::error::map_db_error;

/// Row returned by the insert-or-touch upsert.
#[derive(FromRow)]
struct UpsertedRecord {
    #[sqlx(flatten)]
    record: IdempotencyRecord,
    inserted: bool,
}

/// Repository for the `idempotency_keys` table.
#[derive(Debug, Clone)]
pub struct IdempotencyRepository {
    pool: PgPool,
}

impl IdempotencyRepository {
    /// Create a new idempotency repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records still `in_progress` whose claim expired before `now`.
    pub async fn find_stale(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<IdempotencyRecord>> {
        sqlx::query_as::<_, IdempotencyRecord>(
            "SELECT * FROM idempotency_keys \
             WHERE status = 'in_progress' AND locked_until < $1 \
             ORDER BY locked_until LIMIT $2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to list stale idempotency records", e))
    }
}

/// Fenced terminal write shared by the repository and
/// [`UnitOfWork::finalize`](crate::transaction::UnitOfWork::finalize).
///
/// Returns the updated row, or `None` when the fence did not match.
pub(crate) async fn write_outcome<'e, E>(
    executor: E,
    outcome: &RecordOutcome,
) -> AppResult<Option<IdempotencyRecord>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, IdempotencyRecord>(
        "UPDATE idempotency_keys SET \
            status = $4, response_code = $5, response_body = $6, \
            resource_type = $7, resource_id = $8, \
            locked_until = NULL, updated_at = NOW() \
         WHERE scope = $1 AND idempotency_key = $2 \
           AND attempt = $3 AND status = 'in_progress' \
         RETURNING *",
    )
    .bind(&outcome.scope)
    .bind(&outcome.idempotency_key)
    .bind(outcome.attempt)
    .bind(outcome.status)
    .bind(outcome.response_code)
    .bind(&outcome.response_body)
    .bind(&outcome.resource_type)
    .bind(&outcome.resource_id)
    .fetch_optional(executor)
    .await
    .map_err(|e| map_db_error("Failed to store idempotency outcome", e))
}

#[async_trait]
impl IdempotencyStore for IdempotencyRepository {
    async fn create_if_absent(&self, attempt: &NewAttempt) -> AppResult<(IdempotencyRecord, bool)> {
        // xmax is 0 only for a tuple this statement inserted.
        let row = sqlx::query_as::<_, UpsertedRecord>(
            "INSERT INTO idempotency_keys \
                (id, scope, idempotency_key, request_hash, status, attempt, locked_until) \
             VALUES ($1, $2, $3, $4, 'in_progress', 1, $5) \
             ON CONFLICT (scope, idempotency_key) DO UPDATE SET last_seen_at = NOW() \
             RETURNING *, (xmax = 0) AS inserted",
        )
        .bind(&attempt.id)
        .bind(&attempt.scope)
        .bind(&attempt.idempotency_key)
        .bind(&attempt.request_hash)
        .bind(attempt.locked_until)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to create idempotency record", e))?;

        Ok((row.record, row.inserted))
    }

    async fn find(&self, scope: &str, key: &str) -> AppResult<Option<IdempotencyRecord>> {
        sqlx::query_as::<_, IdempotencyRecord>(
            "SELECT * FROM idempotency_keys WHERE scope = $1 AND idempotency_key = $2",
        )
        .bind(scope)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to find idempotency record", e))
    }

    async fn update_result(&self, outcome: &RecordOutcome) -> AppResult<bool> {
        if write_outcome(&self.pool, outcome).await?.is_some() {
            return Ok(true);
        }
        match self.find(&outcome.scope, &outcome.idempotency_key).await? {
            Some(_) => Ok(false),
            None => Err(AppError::not_found(format!(
                "Idempotency record {}/{} not found",
                outcome.scope, outcome.idempotency_key
            ))),
        }
    }

    async fn reclaim(
        &self,
        scope: &str,
        key: &str,
        observed_attempt: i32,
        locked_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<IdempotencyRecord>> {
        sqlx::query_as::<_, IdempotencyRecord>(
            "UPDATE idempotency_keys SET \
                attempt = attempt + 1, locked_until = $4, \
                updated_at = NOW(), last_seen_at = NOW() \
             WHERE scope = $1 AND idempotency_key = $2 \
               AND attempt = $3 AND status = 'in_progress' \
               AND (locked_until IS NULL OR locked_until <= $5) \
             RETURNING *",
        )
        .bind(scope)
        .bind(key)
        .bind(observed_attempt)
        .bind(locked_until)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to reclaim idempotency record", e))
    }

    async fn release(&self, scope: &str, key: &str, attempt: i32) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE idempotency_keys SET locked_until = NULL, updated_at = NOW() \
             WHERE scope = $1 AND idempotency_key = $2 \
               AND attempt = $3 AND status = 'in_progress'",
        )
        .bind(scope)
        .bind(key)
        .bind(attempt)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to release idempotency record", e))?;
        Ok(result.rows_affected() == 1)
    }
}
