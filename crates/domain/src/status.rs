//! Live simulation status and timeline intervals (§3, §4.5).

use crate::profile::ActivityPoint;
use crate::snapshot::Snapshot;

/// One completed timeline bucket (§3), aggregated over a fixed logical
/// window (typically 60 simulated seconds) and retained for the report's
/// `timeline` array and CSV export.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineInterval {
    /// Simulated seconds elapsed since `sim_start` at the end of this
    /// interval.
    pub sim_offset_secs: i64,
    /// Successful + failed executions recorded during this interval.
    pub queries: u64,
    /// Failed executions recorded during this interval.
    pub errors: u64,
    /// Executions classified `"read"` (`domain::classify_read_write`)
    /// during this interval.
    pub read_count: u64,
    /// Executions classified `"write"` during this interval.
    pub write_count: u64,
    /// Target QPS the controller was aiming for during this interval.
    pub target_qps: f64,
    /// Actual QPS observed during this interval.
    pub actual_qps: f64,
    /// Worker pool size in effect during this interval.
    pub active_workers: u32,
    /// Error rate observed during this interval, in `[0, 100]`.
    pub error_rate_pct: f64,
    /// p50 latency observed during this interval, in milliseconds.
    pub p50_ms: f64,
    /// p95 latency observed during this interval, in milliseconds.
    pub p95_ms: f64,
    /// p99 latency observed during this interval, in milliseconds.
    pub p99_ms: f64,
    /// Names of events active at any point during this interval.
    pub events_triggered: Vec<String>,
}

/// Live state exposed by the simulation executor while it runs, for
/// progress reporting or an eventual interactive dashboard (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationStatus {
    /// Simulated seconds elapsed since `sim_start`.
    pub sim_offset_secs: i64,
    /// Total simulated duration requested.
    pub sim_duration_secs: i64,
    /// Activity point currently driving the target QPS curve.
    pub current_activity: ActivityPoint,
    /// Target QPS for the current tick, after event multipliers.
    pub target_qps: f64,
    /// Current worker pool size.
    pub active_workers: u32,
    /// Names of events active right now.
    pub active_events: Vec<String>,
    /// Cumulative aggregator snapshot as of this tick.
    pub snapshot: Snapshot,
}

impl SimulationStatus {
    /// Fraction of the simulated run completed, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.sim_duration_secs == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let progress = self.sim_offset_secs as f64 / self.sim_duration_secs as f64;
        progress.clamp(0.0, 1.0)
    }
}
