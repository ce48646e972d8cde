//! Point-in-time aggregator snapshots (§3, §4.2).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::ErrorKind;

/// Latency summary derived from a histogram: min/max/mean/stddev plus the
/// percentiles named in spec §3, all in whole microseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    /// Minimum recorded latency, in microseconds.
    pub min_us: u64,
    /// Maximum recorded latency, in microseconds.
    pub max_us: u64,
    /// Arithmetic mean latency, in microseconds.
    pub mean_us: f64,
    /// Standard deviation of recorded latencies, in microseconds.
    pub stddev_us: f64,
    /// 50th percentile, in microseconds.
    pub p50_us: u64,
    /// 90th percentile, in microseconds.
    pub p90_us: u64,
    /// 95th percentile, in microseconds.
    pub p95_us: u64,
    /// 99th percentile, in microseconds.
    pub p99_us: u64,
    /// 99.9th percentile, in microseconds.
    pub p999_us: u64,
}

impl LatencySummary {
    /// Convert every field to milliseconds as `f64`, matching the report
    /// schema's `{..}_ms` float fields (§6).
    #[must_use]
    pub fn to_millis(self) -> LatencySummaryMs {
        LatencySummaryMs {
            min_ms: self.min_us as f64 / 1000.0,
            max_ms: self.max_us as f64 / 1000.0,
            mean_ms: self.mean_us / 1000.0,
            std_dev_ms: self.stddev_us / 1000.0,
            p50_ms: self.p50_us as f64 / 1000.0,
            p90_ms: self.p90_us as f64 / 1000.0,
            p95_ms: self.p95_us as f64 / 1000.0,
            p99_ms: self.p99_us as f64 / 1000.0,
            p999_ms: self.p999_us as f64 / 1000.0,
        }
    }
}

/// Millisecond-float rendering of [`LatencySummary`], for the JSON report.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LatencySummaryMs {
    #[allow(missing_docs)]
    pub min_ms: f64,
    #[allow(missing_docs)]
    pub max_ms: f64,
    #[allow(missing_docs)]
    pub mean_ms: f64,
    #[allow(missing_docs)]
    pub std_dev_ms: f64,
    #[allow(missing_docs)]
    pub p50_ms: f64,
    #[allow(missing_docs)]
    pub p90_ms: f64,
    #[allow(missing_docs)]
    pub p95_ms: f64,
    #[allow(missing_docs)]
    pub p99_ms: f64,
    #[allow(missing_docs)]
    pub p999_ms: f64,
}

/// Per-operation slice of a [`Snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSnapshot {
    /// Operation (template) name.
    pub name: String,
    /// Successful executions recorded.
    pub count: u64,
    /// Failed executions recorded.
    pub error_count: u64,
    /// `count / wall_duration`.
    pub qps: f64,
    /// Latency distribution summary, absent only if `count == 0`.
    pub latency: Option<LatencySummary>,
    /// Error counts broken down by [`ErrorKind`].
    pub error_kinds: HashMap<ErrorKind, u64>,
}

/// An immutable, point-in-time deep copy of aggregator state (§3).
///
/// Produced on demand from the aggregator; the aggregator outlives any
/// snapshot it has handed out.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Wall-clock instant the aggregator (or measured phase) started.
    pub start_time: Instant,
    /// Wall-clock duration covered by this snapshot.
    pub wall_duration: Duration,
    /// Sum of `count` across all operations.
    pub total_queries: u64,
    /// Sum of `error_count` across all operations.
    pub total_errors: u64,
    /// `total_queries / wall_duration`.
    pub qps: f64,
    /// Per-operation breakdown, keyed by operation name.
    pub per_operation: HashMap<String, OperationSnapshot>,
}

impl Snapshot {
    /// `success_rate_pct + error_rate_pct == 100` within `1e-9` (spec §8
    /// invariant 3), expressed directly as the two percentages.
    #[must_use]
    pub fn success_error_rates_pct(&self) -> (f64, f64) {
        if self.total_queries == 0 {
            return (100.0, 0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let error_rate = self.total_errors as f64 / self.total_queries as f64 * 100.0;
        (100.0 - error_rate, error_rate)
    }
}
