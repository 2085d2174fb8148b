//! The balance-mutation discipline as a type.
//!
//! A [`UnitOfWork`] wraps one PostgreSQL transaction. Wallet rows can only
//! be locked through a [`LockSet`], so every unit of work acquires row locks
//! in the same global order. Balance checks happen against the locked rows,
//! and [`finalize`](UnitOfWork::finalize) writes the succeeded idempotency
//! outcome inside the same transaction, fenced on the attempt token. A
//! committed domain change therefore always has its outcome recorded.
//!
//! Dropping a unit of work without committing rolls it back.

use std::collections::BTreeMap;

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

use coinvault_core::error::AppError;
use coinvault_core::result::AppResult;
use coinvault_core::types::{LockSet, UserId};
use coinvault_entity::audit::{AuditEvent, CreateAuditEvent};
use coinvault_entity::mutation::{MutationAttempt, MutationResult};
use coinvault_entity::wallet::Wallet;

use crate::audit::postgres::insert_event;
use crate::error::map_db_error;
use crate::idempotency::postgres::write_outcome;
use crate::ledger::attempt_superseded;

/// One transactional balance mutation.
pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    /// Open a transaction.
    pub async fn begin(pool: &PgPool) -> AppResult<Self> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;
        Ok(Self { tx })
    }

    /// Raw connection for statements specific to one unit of work.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Lock wallet rows one at a time in lock-set order.
    ///
    /// Users without a wallet are simply absent from the returned map.
    pub async fn lock_wallets(
        &mut self,
        users: &LockSet<UserId>,
    ) -> AppResult<BTreeMap<UserId, Wallet>> {
        let mut locked = BTreeMap::new();
        for user_id in users.iter() {
            let wallet = sqlx::query_as::<_, Wallet>(
                "SELECT * FROM user_wallets WHERE user_id = $1 FOR UPDATE",
            )
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to lock wallet", e))?;
            if let Some(wallet) = wallet {
                locked.insert(*user_id, wallet);
            }
        }
        debug!(requested = users.len(), locked = locked.len(), "Locked wallet rows");
        Ok(locked)
    }

    /// Lock a wallet row, creating an empty wallet first if none exists.
    pub async fn lock_or_open_wallet(&mut self, user_id: UserId) -> AppResult<Wallet> {
        sqlx::query("INSERT INTO user_wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_db_error("Failed to open wallet", e))?;

        let mut locked = self.lock_wallets(&LockSet::new([user_id])).await?;
        locked
            .remove(&user_id)
            .ok_or_else(|| AppError::internal(format!("Wallet {user_id} vanished after insert")))
    }

    /// Add `delta` to a locked wallet's balance and return the new balance.
    ///
    /// Callers check sufficiency against the locked row first; the column
    /// constraint still rejects a negative balance.
    pub async fn adjust_coins(&mut self, user_id: UserId, delta: i64) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE user_wallets SET coins = coins + $2, updated_at = NOW() \
             WHERE user_id = $1 RETURNING coins",
        )
        .bind(user_id)
        .bind(delta)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to update wallet balance", e))
    }

    /// Append item keys to a locked wallet's inventory.
    pub async fn push_inventory(&mut self, user_id: UserId, items: &[String]) -> AppResult<()> {
        sqlx::query(
            "UPDATE user_wallets SET inventory = inventory || $2::jsonb, updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(serde_json::to_value(items)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("Failed to update inventory", e))?;
        Ok(())
    }

    /// Append an audit event inside the transaction.
    pub async fn append_audit(&mut self, event: &CreateAuditEvent) -> AppResult<AuditEvent> {
        insert_event(&mut *self.tx, event).await
    }

    /// Record the succeeded outcome for `attempt` inside the transaction.
    ///
    /// Fails with `FENCING_TOKEN_LOST` when the attempt no longer owns the
    /// record; the caller must then drop the unit of work.
    pub async fn finalize(
        &mut self,
        attempt: &MutationAttempt,
        result: &MutationResult,
    ) -> AppResult<()> {
        let written = write_outcome(&mut *self.tx, &attempt.succeeded(result)).await?;
        if written.is_none() {
            return Err(attempt_superseded(attempt));
        }
        Ok(())
    }

    /// Commit the transaction.
    pub async fn commit(self) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_db_error("Failed to commit transaction", e))
    }
}
