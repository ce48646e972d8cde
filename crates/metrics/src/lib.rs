//! Metrics Aggregator (C2): a process-wide, read-mostly registry of
//! per-operation counters and latency histograms (§4.2).
//!
//! Registry lookups take a read lock; only first-observation of a new
//! operation name takes a write lock. Within an entry, counters are
//! atomic and the histogram is behind its own mutex, so snapshotting one
//! operation never blocks mutation of another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use parking_lot::{Mutex, RwLock};

use domain::{ErrorKind, LatencySummary, OperationSnapshot, Snapshot};

/// Histogram range: 1 microsecond to 60 seconds, three significant
/// figures of precision (§3). The histogram itself stores microseconds;
/// `record_latency` takes nanoseconds and converts.
const HIST_LOW_US: u64 = 1;
const HIST_HIGH_US: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

const NANOS_PER_MICRO: u64 = 1_000;

/// Per-operation counters, histogram, and error breakdown.
struct OperationStats {
    count: AtomicU64,
    error_count: AtomicU64,
    histogram: Mutex<Histogram<u64>>,
    error_kinds: Mutex<HashMap<ErrorKind, u64>>,
}

impl OperationStats {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            histogram: Mutex::new(
                Histogram::new_with_bounds(HIST_LOW_US, HIST_HIGH_US, HIST_SIGFIG)
                    .expect("static histogram bounds are valid"),
            ),
            error_kinds: Mutex::new(HashMap::new()),
        }
    }

    fn record_latency(&self, nanos: u64) {
        let micros = (nanos / NANOS_PER_MICRO).clamp(HIST_LOW_US, HIST_HIGH_US);
        self.histogram
            .lock()
            .record(micros)
            .expect("value is pre-clamped to the histogram's bounds");
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_count(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_error(&self, kind: ErrorKind) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        *self.error_kinds.lock().entry(kind).or_insert(0) += 1;
    }

    fn snapshot(&self, name: &str, wall_duration: Duration) -> OperationSnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let error_count = self.error_count.load(Ordering::Relaxed);
        let hist = self.histogram.lock();
        let latency = (hist.len() > 0).then(|| LatencySummary {
            min_us: hist.min(),
            max_us: hist.max(),
            mean_us: hist.mean(),
            stddev_us: hist.stdev(),
            p50_us: hist.value_at_quantile(0.50),
            p90_us: hist.value_at_quantile(0.90),
            p95_us: hist.value_at_quantile(0.95),
            p99_us: hist.value_at_quantile(0.99),
            p999_us: hist.value_at_quantile(0.999),
        });
        drop(hist);
        let qps = if wall_duration.as_secs_f64() > 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let qps = count as f64 / wall_duration.as_secs_f64();
            qps
        } else {
            0.0
        };
        OperationSnapshot {
            name: name.to_owned(),
            count,
            error_count,
            qps,
            latency,
            error_kinds: self.error_kinds.lock().clone(),
        }
    }

    fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        self.histogram.lock().reset();
        self.error_kinds.lock().clear();
    }
}

/// Process-wide per-operation metrics registry (§4.2).
///
/// Cheap to clone: internally an `Arc` over the registry and atomics, so
/// every worker holds its own handle without extra indirection.
#[derive(Clone)]
pub struct MetricsAggregator {
    registry: Arc<RwLock<HashMap<String, Arc<OperationStats>>>>,
    start_time: Arc<Mutex<Instant>>,
}

impl std::fmt::Debug for MetricsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsAggregator")
            .field("operations", &self.registry.read().len())
            .finish()
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    /// Construct an empty aggregator; `start_time` is set to now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            start_time: Arc::new(Mutex::new(Instant::now())),
        }
    }

    fn entry(&self, op: &str) -> Arc<OperationStats> {
        if let Some(stats) = self.registry.read().get(op) {
            return Arc::clone(stats);
        }
        let mut write = self.registry.write();
        Arc::clone(
            write
                .entry(op.to_owned())
                .or_insert_with(|| Arc::new(OperationStats::new())),
        )
    }

    /// Record a successful execution's latency, in nanoseconds. Clamped
    /// into `[1 us, 60 s]` before the histogram insert.
    pub fn record_latency(&self, op: &str, nanos: u64) {
        self.entry(op).record_latency(nanos);
    }

    /// Count an outcome without a latency measurement.
    pub fn increment_count(&self, op: &str) {
        self.entry(op).increment_count();
    }

    /// Count a classified failure.
    pub fn increment_error(&self, op: &str, kind: ErrorKind) {
        self.entry(op).increment_error(kind);
    }

    /// Deep-copy the current state into an immutable [`Snapshot`].
    ///
    /// Per-operation fields are mutually consistent (count, errors, and
    /// histogram observed under the same per-op lock); the snapshot as a
    /// whole is not globally atomic across operations (§4.2).
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let start_time = *self.start_time.lock();
        let wall_duration = start_time.elapsed();
        let registry = self.registry.read();
        let per_operation: HashMap<String, OperationSnapshot> = registry
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot(name, wall_duration)))
            .collect();
        let total_queries: u64 = per_operation.values().map(|o| o.count).sum();
        let total_errors: u64 = per_operation.values().map(|o| o.error_count).sum();
        #[allow(clippy::cast_precision_loss)]
        let qps = if wall_duration.as_secs_f64() > 0.0 {
            total_queries as f64 / wall_duration.as_secs_f64()
        } else {
            0.0
        };
        Snapshot {
            start_time,
            wall_duration,
            total_queries,
            total_errors,
            qps,
            per_operation,
        }
    }

    /// Clear every operation's counters and histogram and rebase
    /// `start_time` to now (used at the warmup/measured phase boundary).
    pub fn reset(&self) {
        for stats in self.registry.read().values() {
            stats.reset();
        }
        *self.start_time.lock() = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::MetricsAggregator;
    use domain::ErrorKind;

    #[test]
    fn count_tracks_histogram_samples() {
        let agg = MetricsAggregator::new();
        agg.record_latency("point_select", 5_000);
        agg.record_latency("point_select", 7_000);
        agg.increment_error("point_select", ErrorKind::Timeout);

        let snap = agg.snapshot();
        let op = &snap.per_operation["point_select"];
        assert_eq!(op.count, 2);
        assert_eq!(op.error_count, 1);
        assert_eq!(op.error_kinds[&ErrorKind::Timeout], 1);
        let latency = op.latency.expect("histogram has samples");
        assert!(latency.min_us <= latency.p50_us);
        assert!(latency.p50_us <= latency.p90_us);
        assert!(latency.p90_us <= latency.p95_us);
        assert!(latency.p95_us <= latency.p99_us);
        assert!(latency.p99_us <= latency.p999_us);
        assert!(latency.p999_us <= latency.max_us);
    }

    #[test]
    fn clamps_out_of_range_latencies() {
        let agg = MetricsAggregator::new();
        agg.record_latency("op", 1); // below 1 us
        agg.record_latency("op", 120_000_000_000); // above 60 s
        let snap = agg.snapshot();
        let latency = snap.per_operation["op"].latency.unwrap();
        assert_eq!(latency.min_us, 1);
        assert_eq!(latency.max_us, 60_000_000);
    }

    #[test]
    fn totals_sum_across_operations() {
        let agg = MetricsAggregator::new();
        agg.record_latency("a", 1_000);
        agg.record_latency("a", 1_000);
        agg.increment_count("b");
        agg.increment_error("b", ErrorKind::Constraint);

        let snap = agg.snapshot();
        assert_eq!(snap.total_queries, 3);
        assert_eq!(snap.total_errors, 1);
        let (success_pct, error_pct) = snap.success_error_rates_pct();
        assert!((success_pct + error_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_counters_and_rebases_start() {
        let agg = MetricsAggregator::new();
        agg.record_latency("op", 1_000);
        agg.reset();
        let snap = agg.snapshot();
        assert_eq!(snap.total_queries, 0);
        assert!(snap.per_operation.get("op").is_none_or(|o| o.count == 0));
    }
}
