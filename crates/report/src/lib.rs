//! Report Builder (C6): a pure function assembling a typed report
//! artifact from a snapshot plus run metadata, serialised to the stable
//! JSON schema in §6.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use domain::classify_read_write;
use domain::{OperationSnapshot, Snapshot, TimelineInterval};

const SCHEMA_VERSION: &str = "1";

/// `run_info` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    /// Run start, RFC 3339.
    pub start_time: DateTime<Utc>,
    /// Run end, RFC 3339.
    pub end_time: DateTime<Utc>,
    /// Human-readable duration (e.g. `"30s"`).
    pub duration: String,
    /// Duration in seconds, as a float.
    pub duration_sec: f64,
    /// `"burst"` or `"simulation"`.
    pub mode: String,
    /// Profile name used for this run.
    pub profile: String,
    /// Master RNG seed.
    pub seed: u64,
    /// Worker count (burst: fixed; simulation: peak).
    pub workers: u32,
    /// Connection pool ceiling in effect.
    pub connections: u32,
}

/// `summary` (§6).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Summary {
    #[allow(missing_docs)]
    pub total_queries: u64,
    #[allow(missing_docs)]
    pub total_errors: u64,
    #[allow(missing_docs)]
    pub qps: f64,
    #[allow(missing_docs)]
    pub error_rate_pct: f64,
    #[allow(missing_docs)]
    pub success_rate_pct: f64,
    #[allow(missing_docs)]
    pub read_queries: u64,
    #[allow(missing_docs)]
    pub write_queries: u64,
    #[allow(missing_docs)]
    pub read_write_ratio: f64,
}

/// `latencies[name]` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct LatencyEntry {
    /// Operation (template) name.
    pub operation: String,
    /// `"read"` or `"write"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Successful executions.
    pub count: u64,
    /// `count / wall_duration`.
    pub qps: f64,
    #[serde(flatten)]
    pub latency: domain::LatencySummaryMs,
}

/// `errors[name]` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    /// Operation (template) name.
    pub operation: String,
    /// Total failed executions for this operation.
    pub total_count: u64,
    /// Breakdown by error-kind label.
    pub by_type: HashMap<String, u64>,
}

/// `simulation_info` (§6), present only on simulation runs.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationInfo {
    /// Configured time-compression scale.
    pub time_scale: u8,
    /// Simulated start offset, in seconds (always 0 for a fresh run).
    pub start_sim_time: i64,
    /// Simulated end offset, in seconds.
    pub end_sim_time: i64,
    /// Simulated duration covered, in milliseconds.
    pub simulated_duration_ms: f64,
    /// Real (wall-clock) duration of the run, in milliseconds.
    pub real_duration_ms: f64,
    /// Name of the activity profile used.
    pub profile_used: String,
    /// `"simulated"` or `"real"` (§4.5.1).
    pub clock_mode: String,
}

/// `events_triggered[]` entry (§6).
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub start_time: i64,
    #[allow(missing_docs)]
    pub end_time: i64,
    #[allow(missing_docs)]
    pub triggered: bool,
}

/// The full report artifact (§6). Serialises directly to the stable
/// JSON schema; simulation-only fields are `None` on burst runs, so
/// `#[serde(skip_serializing_if = "Option::is_none")]` keeps burst
/// reports free of null clutter.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Schema version, for forward-compatible consumers.
    pub version: String,
    #[allow(missing_docs)]
    pub run_info: RunInfo,
    #[allow(missing_docs)]
    pub summary: Summary,
    /// Keyed by operation name.
    pub latencies: HashMap<String, LatencyEntry>,
    /// Present only for operations that recorded at least one error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<HashMap<String, ErrorEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation_info: Option<SimulationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_triggered: Option<Vec<EventRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_used_bytes: Option<u64>,
}

/// Run metadata not derivable from the snapshot itself.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    #[allow(missing_docs)]
    pub start_time: DateTime<Utc>,
    #[allow(missing_docs)]
    pub end_time: DateTime<Utc>,
    #[allow(missing_docs)]
    pub mode: String,
    #[allow(missing_docs)]
    pub profile: String,
    #[allow(missing_docs)]
    pub seed: u64,
    #[allow(missing_docs)]
    pub workers: u32,
    #[allow(missing_docs)]
    pub connections: u32,
}

/// Additional data attached only for simulation runs.
#[derive(Debug, Clone)]
pub struct SimulationMetadata {
    #[allow(missing_docs)]
    pub time_scale: u8,
    #[allow(missing_docs)]
    pub end_sim_time: i64,
    #[allow(missing_docs)]
    pub real_duration: std::time::Duration,
    #[allow(missing_docs)]
    pub profile_used: String,
    #[allow(missing_docs)]
    pub clock_mode: String,
    #[allow(missing_docs)]
    pub events: Vec<(String, i64, i64, bool)>,
    #[allow(missing_docs)]
    pub storage_used_bytes: u64,
}

/// Assemble a [`Report`] from an aggregator snapshot plus run metadata.
/// Pure: no I/O, no clock reads -- every timestamp is supplied by the
/// caller.
#[must_use]
pub fn build_report(
    snapshot: &Snapshot,
    run: &RunMetadata,
    simulation: Option<&SimulationMetadata>,
) -> Report {
    let mut read_queries = 0u64;
    let mut write_queries = 0u64;
    let mut latencies = HashMap::with_capacity(snapshot.per_operation.len());
    let mut errors = HashMap::new();

    for (name, op) in &snapshot.per_operation {
        let kind = classify_read_write(name);
        match kind {
            "read" => read_queries += op.count,
            _ => write_queries += op.count,
        }
        latencies.insert(name.clone(), latency_entry(name, kind, op));
        if op.error_count > 0 {
            errors.insert(name.clone(), error_entry(name, op));
        }
    }

    let (success_rate_pct, error_rate_pct) = snapshot.success_error_rates_pct();
    let duration_sec = snapshot.wall_duration.as_secs_f64();

    Report {
        version: SCHEMA_VERSION.to_owned(),
        run_info: RunInfo {
            start_time: run.start_time,
            end_time: run.end_time,
            duration: format_duration(snapshot.wall_duration),
            duration_sec,
            mode: run.mode.clone(),
            profile: run.profile.clone(),
            seed: run.seed,
            workers: run.workers,
            connections: run.connections,
        },
        summary: Summary {
            total_queries: snapshot.total_queries,
            total_errors: snapshot.total_errors,
            qps: snapshot.qps,
            error_rate_pct,
            success_rate_pct,
            read_queries,
            write_queries,
            // write_queries == 0 has no finite ratio; report the read
            // count itself rather than an infinity serde_json cannot
            // encode as JSON.
            read_write_ratio: if write_queries > 0 {
                #[allow(clippy::cast_precision_loss)]
                let ratio = read_queries as f64 / write_queries as f64;
                ratio
            } else {
                #[allow(clippy::cast_precision_loss)]
                let ratio = read_queries as f64;
                ratio
            },
        },
        latencies,
        errors: (!errors.is_empty()).then_some(errors),
        simulation_info: simulation.map(|sim| SimulationInfo {
            time_scale: sim.time_scale,
            start_sim_time: 0,
            end_sim_time: sim.end_sim_time,
            simulated_duration_ms: sim.end_sim_time as f64 * 1000.0,
            real_duration_ms: sim.real_duration.as_secs_f64() * 1000.0,
            profile_used: sim.profile_used.clone(),
            clock_mode: sim.clock_mode.clone(),
        }),
        events_triggered: simulation.map(|sim| {
            sim.events
                .iter()
                .map(|(name, start, end, triggered)| EventRecord {
                    name: name.clone(),
                    start_time: *start,
                    end_time: *end,
                    triggered: *triggered,
                })
                .collect()
        }),
        storage_used_bytes: simulation.map(|sim| sim.storage_used_bytes),
    }
}

fn latency_entry(name: &str, kind: &str, op: &OperationSnapshot) -> LatencyEntry {
    let latency = op.latency.unwrap_or(domain::LatencySummary {
        min_us: 0,
        max_us: 0,
        mean_us: 0.0,
        stddev_us: 0.0,
        p50_us: 0,
        p90_us: 0,
        p95_us: 0,
        p99_us: 0,
        p999_us: 0,
    });
    LatencyEntry {
        operation: name.to_owned(),
        kind: kind.to_owned(),
        count: op.count,
        qps: op.qps,
        latency: latency.to_millis(),
    }
}

fn error_entry(name: &str, op: &OperationSnapshot) -> ErrorEntry {
    ErrorEntry {
        operation: name.to_owned(),
        total_count: op.error_count,
        by_type: op.error_kinds.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

fn format_duration(d: std::time::Duration) -> String {
    format!("{}s", d.as_secs())
}

/// Timeline CSV header and one row per interval, columns in the fixed
/// order from §6.
#[must_use]
pub fn timeline_csv(intervals: &[TimelineInterval]) -> String {
    let mut out = String::from(
        "interval_start_sim,queries,errors,read_count,write_count,qps_avg,p50_ms,p95_ms,p99_ms,workers,target_qps,hit_ratio\n",
    );
    for interval in intervals {
        let hit_ratio = if interval.target_qps > 0.0 {
            (interval.actual_qps / interval.target_qps).min(1.0)
        } else {
            1.0
        };
        out.push_str(&format!(
            "{},{},{},{},{},{:.2},{:.2},{:.2},{:.2},{},{:.2},{:.4}\n",
            interval.sim_offset_secs,
            interval.queries,
            interval.errors,
            interval.read_count,
            interval.write_count,
            interval.actual_qps,
            interval.p50_ms,
            interval.p95_ms,
            interval.p99_ms,
            interval.active_workers,
            interval.target_qps,
            hit_ratio
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{build_report, classify_read_write, RunMetadata};
    use chrono::Utc;
    use domain::Snapshot;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn classifies_known_read_patterns() {
        assert_eq!(classify_read_write("point_select"), "read");
        assert_eq!(classify_read_write("range_select"), "read");
        assert_eq!(classify_read_write("customer_order_join"), "read");
    }

    #[test]
    fn classifies_unknown_as_write() {
        assert_eq!(classify_read_write("insert_tx"), "write");
        assert_eq!(classify_read_write("mystery_op"), "write");
    }

    #[test]
    fn build_report_splits_read_write_counts() {
        let snapshot = Snapshot {
            start_time: std::time::Instant::now(),
            wall_duration: Duration::from_secs(10),
            total_queries: 10,
            total_errors: 0,
            qps: 1.0,
            per_operation: HashMap::new(),
        };
        let run = RunMetadata {
            start_time: Utc::now(),
            end_time: Utc::now(),
            mode: "burst".to_owned(),
            profile: "default".to_owned(),
            seed: 42,
            workers: 4,
            connections: 6,
        };
        let report = build_report(&snapshot, &run, None);
        assert_eq!(report.summary.total_queries, 10);
        assert!(report.simulation_info.is_none());
        assert!(report.errors.is_none());
    }
}
