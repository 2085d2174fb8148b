//! Idempotent mutation engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the executor does when it finds an `in_progress` record whose lock
/// has expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleLockPolicy {
    /// Answer `IDEMPOTENCY_IN_PROGRESS` until an operator resolves the record.
    Reject,
    /// Take the record over with a fenced conditional update and run the
    /// unit of work again. Only one reclaimer wins.
    Reclaim,
}

impl Default for StaleLockPolicy {
    fn default() -> Self {
        Self::Reclaim
    }
}

/// Idempotency engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// How long a fresh attempt owns its record before it counts as stale.
    #[serde(default = "default_lock_duration")]
    pub lock_duration_ms: u64,
    /// Behaviour for expired `in_progress` records.
    #[serde(default)]
    pub stale_lock_policy: StaleLockPolicy,
    /// Maximum scope length in characters.
    #[serde(default = "default_max_scope_length")]
    pub max_scope_length: usize,
    /// Maximum idempotency key length in characters.
    #[serde(default = "default_max_key_length")]
    pub max_key_length: usize,
}

impl IdempotencyConfig {
    /// The default lock duration as a [`Duration`].
    pub fn lock_duration(&self) -> Duration {
        Duration::from_millis(self.lock_duration_ms)
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            lock_duration_ms: default_lock_duration(),
            stale_lock_policy: StaleLockPolicy::default(),
            max_scope_length: default_max_scope_length(),
            max_key_length: default_max_key_length(),
        }
    }
}

fn default_lock_duration() -> u64 {
    30_000
}

fn default_max_scope_length() -> usize {
    120
}

fn default_max_key_length() -> usize {
    255
}
