//! The idempotent mutation executor.
//!
//! For a fixed `(scope, key)` the unit of work runs at most once per
//! attempt token. Callers that arrive after a terminal outcome get that
//! outcome replayed; callers that arrive while an attempt holds an
//! unexpired claim get `IDEMPOTENCY_IN_PROGRESS`.
//!
//! Claims that expired (crashed or hung owners) are handled by
//! [`StaleLockPolicy`]. Under `Reclaim` the first caller to observe the
//! expiry takes the record over and the attempt token is bumped, so any
//! write by the previous owner is rejected by the store.
//!
//! Failures are split by [`ErrorKind::is_retryable`](coinvault_core::error::ErrorKind::is_retryable):
//! domain failures are stored as the terminal `failed` outcome, transient
//! ones release the claim so a retry with the same key runs again.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};

use coinvault_core::config::{IdempotencyConfig, StaleLockPolicy};
use coinvault_core::error::{AppError, codes};
use coinvault_core::result::AppResult;
use coinvault_core::traits::{MetricsSink, MutationSample, SampleOutcome};
use coinvault_core::types::new_id;
use coinvault_database::audit::AuditSink;
use coinvault_database::idempotency::IdempotencyStore;
use coinvault_entity::audit::{AuditSeverity, CreateAuditEvent};
use coinvault_entity::idempotency::{IdempotencyRecord, IdempotencyStatus, NewAttempt};
use coinvault_entity::mutation::{MutationAttempt, MutationOutcome, MutationResult};

use super::hash::request_hash;
use super::request::MutationRequest;

/// How one call ended, before it is reported.
struct Finished {
    result: AppResult<MutationOutcome>,
    outcome: SampleOutcome,
    audit_failed: bool,
}

impl Finished {
    fn replayed(result: AppResult<MutationOutcome>) -> Self {
        let outcome = if result.is_ok() {
            SampleOutcome::Replayed
        } else {
            SampleOutcome::Failed
        };
        Self {
            result,
            outcome,
            audit_failed: false,
        }
    }

    fn conflict(err: AppError) -> Self {
        Self {
            result: Err(err),
            outcome: SampleOutcome::Conflict,
            audit_failed: false,
        }
    }

    fn rejected(err: AppError) -> Self {
        Self {
            result: Err(err),
            outcome: SampleOutcome::Rejected,
            audit_failed: false,
        }
    }

    fn store_failure(err: AppError) -> Self {
        Self {
            result: Err(err),
            outcome: SampleOutcome::Failed,
            audit_failed: false,
        }
    }
}

/// What to do with the record found by `create_if_absent`.
enum Claim {
    /// This caller owns the record and must run the unit of work.
    Owned(IdempotencyRecord),
    /// The call is already answered.
    Done(Finished),
}

/// Runs units of work at most once per `(scope, idempotency_key)`.
#[derive(Debug, Clone)]
pub struct MutationExecutor {
    store: Arc<dyn IdempotencyStore>,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<dyn MetricsSink>,
    config: IdempotencyConfig,
}

impl MutationExecutor {
    /// Creates a new executor.
    pub fn new(
        store: Arc<dyn IdempotencyStore>,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<dyn MetricsSink>,
        config: IdempotencyConfig,
    ) -> Self {
        Self {
            store,
            audit,
            metrics,
            config,
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    /// Execute `unit_of_work` idempotently.
    ///
    /// Returns the canonical outcome: freshly executed (`replayed = false`)
    /// or read back (`replayed = true`, possibly a stored failure). A fresh
    /// failure is returned as the unit of work's own error after it has been
    /// recorded. Conflicts surface as `IDEMPOTENCY_PAYLOAD_MISMATCH` or
    /// `IDEMPOTENCY_IN_PROGRESS`.
    pub async fn execute<F, Fut>(
        &self,
        request: MutationRequest,
        unit_of_work: F,
    ) -> AppResult<MutationOutcome>
    where
        F: FnOnce(MutationAttempt) -> Fut + Send,
        Fut: Future<Output = AppResult<MutationResult>> + Send,
    {
        let started = Instant::now();
        let channel = request.scope.trim().to_string();

        let finished = self.run(request, unit_of_work).await;

        self.metrics.record(&MutationSample {
            channel,
            outcome: finished.outcome,
            duration: started.elapsed(),
            audit_failed: finished.audit_failed,
        });
        finished.result
    }

    async fn run<F, Fut>(&self, request: MutationRequest, unit_of_work: F) -> Finished
    where
        F: FnOnce(MutationAttempt) -> Fut + Send,
        Fut: Future<Output = AppResult<MutationResult>> + Send,
    {
        let request = match request.normalize(&self.config) {
            Ok(request) => request,
            Err(e) => return Finished::rejected(e),
        };
        let hash = match request_hash(request.payload.as_ref()) {
            Ok(hash) => hash,
            Err(e) => return Finished::rejected(e),
        };

        let record = match self.claim(&request, hash).await {
            Ok(Claim::Owned(record)) => record,
            Ok(Claim::Done(finished)) => return finished,
            Err(e) => return Finished::store_failure(e),
        };

        let attempt = MutationAttempt {
            scope: request.scope.clone(),
            idempotency_key: request.idempotency_key.clone(),
            attempt: record.attempt,
            actor: request.actor_user_id,
            request_id: request.request_id.clone(),
        };

        match unit_of_work(attempt.clone()).await {
            Ok(result) => self.complete_success(&request, &attempt, result).await,
            Err(err) => self.complete_failure(&request, &attempt, err).await,
        }
    }

    /// Register the attempt or decide the call from the existing record.
    async fn claim(&self, request: &MutationRequest, hash: Option<String>) -> AppResult<Claim> {
        let now = Utc::now();
        let lock_duration = request
            .lock_duration
            .unwrap_or_else(|| self.config.lock_duration());
        let lock_delta = chrono::Duration::from_std(lock_duration)
            .map_err(|_| AppError::validation("lock duration out of range"))?;
        let locked_until = now + lock_delta;

        let (record, inserted) = self
            .store
            .create_if_absent(&NewAttempt {
                id: new_id("idem"),
                scope: request.scope.clone(),
                idempotency_key: request.idempotency_key.clone(),
                request_hash: hash.clone(),
                locked_until,
            })
            .await?;

        if inserted {
            debug!(scope = %request.scope, key = %request.idempotency_key, "New idempotency record");
            return Ok(Claim::Owned(record));
        }

        if record.request_hash != hash {
            warn!(
                scope = %request.scope,
                key = %request.idempotency_key,
                "Idempotency key reused with a different payload"
            );
            return Ok(Claim::Done(Finished::conflict(AppError::payload_mismatch())));
        }

        if record.status.is_terminal() {
            debug!(
                scope = %request.scope,
                key = %request.idempotency_key,
                status = %record.status,
                "Replaying stored outcome"
            );
            return Ok(Claim::Done(Finished::replayed(MutationOutcome::replay(&record))));
        }

        if record.is_locked_at(now) {
            warn!(
                scope = %request.scope,
                key = %request.idempotency_key,
                attempt = record.attempt,
                "Idempotency key is held by another attempt"
            );
            return Ok(Claim::Done(Finished::conflict(AppError::in_progress())));
        }

        // Released records are always claimable; expired claims only under
        // the reclaim policy.
        if !record.is_released() && self.config.stale_lock_policy == StaleLockPolicy::Reject {
            warn!(
                scope = %request.scope,
                key = %request.idempotency_key,
                attempt = record.attempt,
                locked_until = ?record.locked_until,
                "Stale idempotency claim left in place"
            );
            return Ok(Claim::Done(Finished::conflict(AppError::in_progress())));
        }

        match self
            .store
            .reclaim(
                &request.scope,
                &request.idempotency_key,
                record.attempt,
                locked_until,
                now,
            )
            .await?
        {
            Some(reclaimed) => {
                info!(
                    scope = %request.scope,
                    key = %request.idempotency_key,
                    attempt = reclaimed.attempt,
                    "Reclaimed idempotency record"
                );
                Ok(Claim::Owned(reclaimed))
            }
            None => {
                // Someone else won the takeover or the record just finished.
                let current = self
                    .store
                    .find(&request.scope, &request.idempotency_key)
                    .await?;
                match current {
                    Some(current) if current.status.is_terminal() => Ok(Claim::Done(
                        Finished::replayed(MutationOutcome::replay(&current)),
                    )),
                    _ => Ok(Claim::Done(Finished::conflict(AppError::in_progress()))),
                }
            }
        }
    }

    async fn complete_success(
        &self,
        request: &MutationRequest,
        attempt: &MutationAttempt,
        result: MutationResult,
    ) -> Finished {
        let record_outcome = attempt.succeeded(&result);
        let outcome = MutationOutcome::executed(result);

        // Units of work built on `UnitOfWork::finalize` have already written
        // this outcome, in which case the update is a fenced no-op.
        match self.store.update_result(&record_outcome).await {
            Ok(true) => {}
            Ok(false) => match self.current_record(attempt).await {
                Ok(record)
                    if record.attempt == attempt.attempt
                        && record.status == IdempotencyStatus::Succeeded => {}
                Ok(record) => return superseded(attempt, &record),
                Err(finished) => return finished,
            },
            Err(e) => {
                error!(
                    scope = %attempt.scope,
                    key = %attempt.idempotency_key,
                    attempt = attempt.attempt,
                    error = %e,
                    "Failed to record succeeded outcome"
                );
            }
        }

        let event = self
            .audit_event(request, attempt, "succeeded")
            .entity_id(
                request
                    .entity_id
                    .clone()
                    .or_else(|| outcome.resource_id.clone()),
            )
            .metadata(json!({
                "scope": attempt.scope,
                "attempt": attempt.attempt,
                "resourceType": outcome.resource_type,
                "resourceId": outcome.resource_id,
            }));
        let audit_failed = !self.emit_audit(attempt, &event).await;

        Finished {
            result: Ok(outcome),
            outcome: SampleOutcome::Succeeded,
            audit_failed,
        }
    }

    async fn complete_failure(
        &self,
        request: &MutationRequest,
        attempt: &MutationAttempt,
        err: AppError,
    ) -> Finished {
        let retryable = err.is_retryable();

        if err.code() == codes::FENCING_TOKEN_LOST {
            return self.resolve_superseded(attempt).await;
        }

        if retryable {
            warn!(
                scope = %attempt.scope,
                key = %attempt.idempotency_key,
                attempt = attempt.attempt,
                error = %err,
                "Transient failure, releasing idempotency claim"
            );
            if let Err(e) = self
                .store
                .release(&attempt.scope, &attempt.idempotency_key, attempt.attempt)
                .await
            {
                error!(
                    scope = %attempt.scope,
                    key = %attempt.idempotency_key,
                    error = %e,
                    "Failed to release idempotency claim"
                );
            }
        } else {
            match self.store.update_result(&attempt.failed(&err)).await {
                Ok(true) => {}
                Ok(false) => return self.resolve_superseded(attempt).await,
                Err(e) => error!(
                    scope = %attempt.scope,
                    key = %attempt.idempotency_key,
                    error = %e,
                    "Failed to record failed outcome"
                ),
            }
        }

        let event = self
            .audit_event(request, attempt, "failed")
            .entity_id(request.entity_id.clone())
            .severity(AuditSeverity::Error)
            .message(err.message.clone())
            .metadata(json!({
                "scope": attempt.scope,
                "attempt": attempt.attempt,
                "code": err.code(),
                "retryable": retryable,
            }));
        let audit_failed = !self.emit_audit(attempt, &event).await;

        Finished {
            result: Err(err),
            outcome: SampleOutcome::Failed,
            audit_failed,
        }
    }

    /// Re-read the record after this attempt's own write was refused.
    async fn current_record(&self, attempt: &MutationAttempt) -> Result<IdempotencyRecord, Finished> {
        match self
            .store
            .find(&attempt.scope, &attempt.idempotency_key)
            .await
        {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(Finished::store_failure(AppError::internal(
                "Idempotency record disappeared during execution",
            ))),
            Err(e) => {
                error!(key = %attempt.idempotency_key, error = %e, "Failed to re-read idempotency record");
                Err(Finished::store_failure(e))
            }
        }
    }

    async fn resolve_superseded(&self, attempt: &MutationAttempt) -> Finished {
        match self.current_record(attempt).await {
            Ok(record) => superseded(attempt, &record),
            Err(finished) => finished,
        }
    }

    fn audit_event(
        &self,
        request: &MutationRequest,
        attempt: &MutationAttempt,
        status: &str,
    ) -> CreateAuditEvent {
        CreateAuditEvent::new(
            request
                .entity_type
                .clone()
                .unwrap_or_else(|| request.scope.clone()),
            request.audit_event_type(status),
        )
        .users(request.actor_user_id, request.target_user_id)
        .correlation(
            request.request_id.clone(),
            Some(attempt.idempotency_key.clone()),
        )
    }

    /// Append an audit event; returns whether it was written.
    async fn emit_audit(&self, attempt: &MutationAttempt, event: &CreateAuditEvent) -> bool {
        match self.audit.append(event).await {
            Ok(_) => true,
            Err(e) => {
                error!(
                    scope = %attempt.scope,
                    key = %attempt.idempotency_key,
                    event_type = %event.event_type,
                    error = %e,
                    "Failed to write audit event"
                );
                false
            }
        }
    }
}

/// Answer a caller whose claim was taken over by a newer attempt.
///
/// The caller never sees its own result: it gets the newer attempt's
/// recorded outcome, or `IDEMPOTENCY_IN_PROGRESS` while that one runs.
fn superseded(attempt: &MutationAttempt, record: &IdempotencyRecord) -> Finished {
    warn!(
        scope = %attempt.scope,
        key = %attempt.idempotency_key,
        attempt = attempt.attempt,
        current = record.attempt,
        status = %record.status,
        "Attempt superseded"
    );
    if record.status.is_terminal() {
        Finished::replayed(MutationOutcome::replay(record))
    } else {
        Finished::conflict(AppError::in_progress())
    }
}
