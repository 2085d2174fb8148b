//! Idempotency record status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an idempotency record.
///
/// A record is created `InProgress` and transitions exactly once to a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "idempotency_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    /// An attempt owns the record and is running.
    InProgress,
    /// The unit of work committed; the stored response is replayed.
    Succeeded,
    /// The unit of work failed with a domain error; the failure is replayed.
    Failed,
}

impl IdempotencyStatus {
    /// Check if the record is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Return the status as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
