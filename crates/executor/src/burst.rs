//! Burst executor (C4): `warmup -> measured -> cooldown` over a single
//! wall-clock interval. Only the measured phase contributes to the
//! reported snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use domain::{Snapshot, TableStats, WeightedTemplates};
use metrics::MetricsAggregator;
use pool::ConnectionPool;

use crate::{run_phase, ExecutorError, WorkerContext};

/// Wall-clock timings for each phase, attached to the run envelope (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimings {
    /// Warmup phase duration actually elapsed.
    pub warmup: Duration,
    /// Measured phase duration actually elapsed.
    pub measured: Duration,
    /// Cooldown phase duration actually elapsed.
    pub cooldown: Duration,
}

/// Result of a completed (or cancelled) burst run.
#[derive(Debug, Clone)]
pub struct BurstOutcome {
    /// Snapshot of the measured phase only (aggregator reset at its start).
    pub snapshot: Snapshot,
    /// Wall-clock start of the run.
    pub start: Instant,
    /// Wall-clock end of the run.
    pub end: Instant,
    /// Per-phase timings.
    pub phase_timings: PhaseTimings,
    /// Whether the run ended via cancellation rather than its deadline.
    pub cancelled: bool,
}

/// Burst-mode configuration.
#[derive(Debug, Clone, Copy)]
pub struct BurstConfig {
    /// Worker count, constant across all three phases.
    pub workers: u32,
    /// Warmup phase duration.
    pub warmup: Duration,
    /// Measured phase duration.
    pub measured: Duration,
    /// Cooldown phase duration.
    pub cooldown: Duration,
    /// Master RNG seed; worker `i` derives `seed ^ i`.
    pub seed: u64,
}

/// Drives a fixed-duration, maximum-throughput run (§4.4).
pub struct BurstExecutor {
    pool: ConnectionPool,
    metrics: MetricsAggregator,
    templates: Arc<WeightedTemplates>,
    table_stats: TableStats,
    cancel: CancellationToken,
}

impl BurstExecutor {
    /// Construct a burst executor over an already-connected pool and a
    /// fixed template table.
    #[must_use]
    pub fn new(
        pool: ConnectionPool,
        metrics: MetricsAggregator,
        templates: Arc<WeightedTemplates>,
        table_stats: TableStats,
    ) -> Self {
        Self {
            pool,
            metrics,
            templates,
            table_stats,
            cancel: CancellationToken::new(),
        }
    }

    /// A clone of this executor's cancellation token, for an external
    /// caller (e.g. a Ctrl-C handler) to trigger a graceful stop.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the three phases to completion (or until cancelled).
    ///
    /// # Errors
    /// Returns [`ExecutorError`] only for executor-internal failures; a
    /// cancelled run returns `Ok` with `cancelled: true` in the outcome,
    /// per §7's cancellation semantics (clean termination with partial
    /// report).
    pub async fn run(&self, config: BurstConfig) -> Result<BurstOutcome, ExecutorError> {
        let ctx = Arc::new(WorkerContext {
            templates: Arc::clone(&self.templates),
            table_stats: self.table_stats,
            pool: self.pool.clone(),
            metrics: self.metrics.clone(),
            cancel: self.cancel.clone(),
            write_bias: None,
        });

        let run_start = Instant::now();

        let warmup_start = Instant::now();
        run_phase(
            Arc::clone(&ctx),
            config.workers,
            config.seed,
            Instant::now() + config.warmup,
        )
        .await;
        let warmup_elapsed = warmup_start.elapsed();

        // Only the measured phase counts: rebase the aggregator.
        self.metrics.reset();
        let measured_start = Instant::now();
        run_phase(
            Arc::clone(&ctx),
            config.workers,
            config.seed,
            Instant::now() + config.measured,
        )
        .await;
        let measured_elapsed = measured_start.elapsed();
        let snapshot = self.metrics.snapshot();

        let cancelled = self.cancel.is_cancelled();
        let cooldown_start = Instant::now();
        if !cancelled {
            run_phase(
                Arc::clone(&ctx),
                config.workers,
                config.seed,
                Instant::now() + config.cooldown,
            )
            .await;
        }
        let cooldown_elapsed = cooldown_start.elapsed();

        Ok(BurstOutcome {
            snapshot,
            start: run_start,
            end: Instant::now(),
            phase_timings: PhaseTimings {
                warmup: warmup_elapsed,
                measured: measured_elapsed,
                cooldown: cooldown_elapsed,
            },
            cancelled,
        })
    }
}
