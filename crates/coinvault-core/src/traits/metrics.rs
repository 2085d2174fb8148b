//! Metrics sink contract for the mutation executor.
//!
//! The executor reports one [`MutationSample`] per call. Sinks are purely
//! observational and must never fail or block the caller.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a single executor call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOutcome {
    /// The unit of work ran and succeeded.
    Succeeded,
    /// The unit of work ran and failed.
    Failed,
    /// A stored outcome was returned without running the unit of work.
    Replayed,
    /// Payload mismatch or another attempt in flight.
    Conflict,
    /// The request was invalid before any store access.
    Rejected,
}

impl SampleOutcome {
    /// Return the outcome as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Replayed => "replayed",
            Self::Conflict => "conflict",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SampleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observation reported by the executor.
#[derive(Debug, Clone)]
pub struct MutationSample {
    /// Logical channel, normally the mutation scope.
    pub channel: String,
    /// How the call ended.
    pub outcome: SampleOutcome,
    /// Wall-clock time spent inside the executor.
    pub duration: Duration,
    /// Whether writing the audit event failed.
    pub audit_failed: bool,
}

/// Receiver for executor metrics.
pub trait MetricsSink: Send + Sync + fmt::Debug {
    /// Record one executor call.
    fn record(&self, sample: &MutationSample);
}

/// Sink that drops every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&self, _sample: &MutationSample) {}
}
