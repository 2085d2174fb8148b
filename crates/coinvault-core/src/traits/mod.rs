//! Core traits defined in `coinvault-core` and implemented by other crates.

pub mod metrics;

pub use metrics::{MetricsSink, MutationSample, NoopMetrics, SampleOutcome};
