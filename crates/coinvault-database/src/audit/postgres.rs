//! Audit ledger repository implementation.

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};

use coinvault_core::result::AppResult;
use coinvault_core::types::{UserId, new_id};
use coinvault_entity::audit::{AuditEvent, CreateAuditEvent};

use super::AuditSink;
use crate::error::map_db_error;

/// Repository for the `economy_audit_log` table.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    /// Create a new audit log repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an audit event by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<AuditEvent>> {
        sqlx::query_as::<_, AuditEvent>("SELECT * FROM economy_audit_log WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to find audit event", e))
    }

    /// Search the ledger, newest first, optionally filtered by actor and
    /// event type. Returns the page and the total match count.
    pub async fn search(
        &self,
        actor: Option<UserId>,
        event_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<AuditEvent>, i64)> {
        let mut conditions = Vec::new();
        let mut param_idx = 1u32;

        if actor.is_some() {
            conditions.push(format!("actor_user_id = ${param_idx}"));
            param_idx += 1;
        }
        if event_type.is_some() {
            conditions.push(format!("event_type = ${param_idx}"));
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM economy_audit_log {where_clause}");
        let select_sql = format!(
            "SELECT * FROM economy_audit_log {where_clause} \
             ORDER BY created_at DESC, id LIMIT ${param_idx} OFFSET ${}",
            param_idx + 1
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut select_query = sqlx::query_as::<_, AuditEvent>(&select_sql);

        if let Some(actor) = actor {
            count_query = count_query.bind(actor);
            select_query = select_query.bind(actor);
        }
        if let Some(event_type) = event_type {
            count_query = count_query.bind(event_type.to_string());
            select_query = select_query.bind(event_type.to_string());
        }

        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to count audit events", e))?;

        let events = select_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to search audit log", e))?;

        Ok((events, total))
    }
}

/// Insert an event through any executor, so units of work can write domain
/// events inside their own transaction.
pub(crate) async fn insert_event<'e, E>(executor: E, data: &CreateAuditEvent) -> AppResult<AuditEvent>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AuditEvent>(
        "INSERT INTO economy_audit_log \
            (id, actor_user_id, target_user_id, entity_type, entity_id, event_type, \
             severity, message, request_id, idempotency_key, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
    )
    .bind(new_id("audit"))
    .bind(data.actor_user_id)
    .bind(data.target_user_id)
    .bind(&data.entity_type)
    .bind(&data.entity_id)
    .bind(&data.event_type)
    .bind(data.severity)
    .bind(&data.message)
    .bind(&data.request_id)
    .bind(&data.idempotency_key)
    .bind(&data.metadata)
    .fetch_one(executor)
    .await
    .map_err(|e| map_db_error("Failed to append audit event", e))
}

#[async_trait]
impl AuditSink for AuditLogRepository {
    async fn append(&self, event: &CreateAuditEvent) -> AppResult<AuditEvent> {
        insert_event(&self.pool, event).await
    }

    async fn list_by_idempotency_key(&self, key: &str) -> AppResult<Vec<AuditEvent>> {
        sqlx::query_as::<_, AuditEvent>(
            "SELECT * FROM economy_audit_log WHERE idempotency_key = $1 ORDER BY created_at, id",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to list audit events", e))
    }
}
