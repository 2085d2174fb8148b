//! Per-channel mutation metrics.
//!
//! Counters are atomics; duration samples sit behind a mutex and are capped
//! so percentile calculation stays cheap. One [`MutationMetrics`] is owned
//! by the application state and injected into the executor.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use coinvault_core::traits::{MetricsSink, MutationSample, SampleOutcome};

/// Maximum number of duration samples kept per channel.
const MAX_DURATION_SAMPLES: usize = 1000;

#[derive(Debug, Default)]
struct ChannelStats {
    calls: AtomicU64,
    executed: AtomicU64,
    replayed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    conflicts: AtomicU64,
    rejected: AtomicU64,
    audit_failures: AtomicU64,
    duration_samples: Mutex<Vec<Duration>>,
}

impl ChannelStats {
    fn record(&self, sample: &MutationSample) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match sample.outcome {
            SampleOutcome::Succeeded => {
                self.executed.fetch_add(1, Ordering::Relaxed);
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            SampleOutcome::Failed => {
                self.executed.fetch_add(1, Ordering::Relaxed);
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            SampleOutcome::Replayed => {
                self.replayed.fetch_add(1, Ordering::Relaxed);
            }
            SampleOutcome::Conflict => {
                self.conflicts.fetch_add(1, Ordering::Relaxed);
            }
            SampleOutcome::Rejected => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
        if sample.audit_failed {
            self.audit_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.add_duration_sample(sample.duration);
    }

    /// Add a duration sample, evicting the oldest if at capacity.
    fn add_duration_sample(&self, duration: Duration) {
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.remove(0);
            }
            samples.push(duration);
        }
    }

    fn snapshot(&self) -> ChannelSnapshot {
        let durations = self
            .duration_samples
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        let (p50, p95, p99) = calculate_percentiles(&durations);

        ChannelSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            audit_failures: self.audit_failures.load(Ordering::Relaxed),
            duration_p50: p50,
            duration_p95: p95,
            duration_p99: p99,
            sample_count: durations.len() as u64,
        }
    }
}

/// Calculate P50/P95/P99 from unsorted durations.
fn calculate_percentiles(
    durations: &[Duration],
) -> (Option<Duration>, Option<Duration>, Option<Duration>) {
    if durations.is_empty() {
        return (None, None, None);
    }

    let mut sorted = durations.to_vec();
    sorted.sort();
    let len = sorted.len();

    let p50 = sorted.get(len * 50 / 100).copied();
    let p95 = sorted.get(len * 95 / 100).copied();
    let p99 = sorted.get(len.saturating_sub(1) * 99 / 100).copied();

    (p50, p95, p99)
}

/// Executor metrics keyed by channel (the mutation scope).
#[derive(Debug, Default)]
pub struct MutationMetrics {
    channels: DashMap<String, Arc<ChannelStats>>,
}

impl MutationMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one channel, if it has seen any call.
    pub fn channel(&self, name: &str) -> Option<ChannelSnapshot> {
        self.channels.get(name).map(|stats| stats.snapshot())
    }

    /// Snapshot of every channel, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, ChannelSnapshot> {
        self.channels
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }
}

impl MetricsSink for MutationMetrics {
    fn record(&self, sample: &MutationSample) {
        let stats = self
            .channels
            .entry(sample.channel.clone())
            .or_default()
            .value()
            .clone();
        stats.record(sample);
    }
}

/// Point-in-time counters for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    /// Every executor call.
    pub calls: u64,
    /// Calls that ran the unit of work.
    pub executed: u64,
    /// Calls answered from a stored outcome.
    pub replayed: u64,
    /// Executed calls that succeeded.
    pub succeeded: u64,
    /// Executed calls that failed.
    pub failed: u64,
    /// Payload mismatches and in-progress rejections.
    pub conflicts: u64,
    /// Calls rejected before touching the store.
    pub rejected: u64,
    /// Calls whose audit event could not be written.
    pub audit_failures: u64,
    /// P50 executor duration.
    #[serde(
        serialize_with = "serialize_opt_duration",
        deserialize_with = "deserialize_opt_duration"
    )]
    pub duration_p50: Option<Duration>,
    /// P95 executor duration.
    #[serde(
        serialize_with = "serialize_opt_duration",
        deserialize_with = "deserialize_opt_duration"
    )]
    pub duration_p95: Option<Duration>,
    /// P99 executor duration.
    #[serde(
        serialize_with = "serialize_opt_duration",
        deserialize_with = "deserialize_opt_duration"
    )]
    pub duration_p99: Option<Duration>,
    /// Number of duration samples held.
    pub sample_count: u64,
}

/// Serialize an optional Duration as milliseconds.
fn serialize_opt_duration<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match duration {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

/// Deserialize an optional Duration from milliseconds.
fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis: Option<u64> = Deserialize::deserialize(deserializer)?;
    Ok(millis.map(Duration::from_millis))
}
