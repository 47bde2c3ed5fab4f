//! Per-slice statistics: percentiles, boxplot summaries, signal helpers, latencies and peaks.
pub mod boxplot;
pub mod latency;
pub mod peaks;
pub mod percentile;
pub mod signal;
