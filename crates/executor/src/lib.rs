//! Workload Executors: burst mode (C4) and simulation mode (C5), §4.4-4.5.
//!
//! Both executors share a worker loop (template selection, parameter
//! generation, session acquisition, timed execution, metrics recording)
//! and a cancellation discipline: a single [`tokio_util::sync::CancellationToken`]
//! propagates to every worker, which finishes its in-flight statement and
//! exits rather than aborting mid-query.

pub mod burst;
pub mod simulation;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};
use tokio_util::sync::CancellationToken;

use domain::{classify_sqlx_error, SqlParam, TableStats, TemplateId, WeightedTemplates};
use metrics::MetricsAggregator;
use pool::ConnectionPool;

pub use burst::{BurstExecutor, BurstOutcome, PhaseTimings};
pub use simulation::{SimulationExecutor, SimulationOutcome};

/// Errors surfaced by either executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The connection pool could not be established or health-checked.
    #[error("pool error: {0}")]
    Pool(#[from] pool::PoolError),
    /// An internal invariant was violated.
    #[error("internal executor error: {0}")]
    Internal(String),
}

/// Per-statement execution deadline. Independent of pool-acquisition
/// deadlines (§4.1): a slow query cannot starve the pool indefinitely.
const STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Dynamic read/write bias for the simulation executor: a shared target
/// fraction (updated once per control tick from the active curve/events,
/// §3's "write biases are additive and clamped to `[0, 1]`") plus the
/// read-only and write-only template pools workers draw from once they've
/// decided which side of the bias a given iteration falls on.
#[derive(Debug, Clone)]
pub struct WriteBias {
    /// Current target fraction of draws that should be writes, encoded as
    /// `f64::to_bits` for lock-free cross-task reads.
    pub target_write_fraction: Arc<AtomicU64>,
    /// Read-only templates, weighted among themselves.
    pub reads: Arc<WeightedTemplates>,
    /// Write-only templates, weighted among themselves.
    pub writes: Arc<WeightedTemplates>,
}

/// Immutable state shared by every worker of a run: the template table,
/// known entity-count bounds, the pool, and the metrics sink.
pub struct WorkerContext {
    /// Weighted template table, immutable for the run's duration.
    pub templates: Arc<WeightedTemplates>,
    /// Row-count bounds used to generate valid foreign keys.
    pub table_stats: TableStats,
    /// Shared connection pool facade.
    pub pool: ConnectionPool,
    /// Shared metrics aggregator.
    pub metrics: MetricsAggregator,
    /// Cooperative cancellation signal.
    pub cancel: CancellationToken,
    /// Dynamic read/write bias, simulation mode only (`None` in burst
    /// mode, which always draws from `templates` directly).
    pub write_bias: Option<WriteBias>,
}

/// One worker: owns its RNG and executes the shared loop until
/// cancelled or the deadline passes.
pub struct Worker {
    id: u32,
    rng: StdRng,
}

impl Worker {
    /// Derive worker `id`'s RNG from `seed ^ id` (Design Note §9: workers
    /// hold explicit `{id, rng, ...}` state rather than implicit
    /// per-task closures).
    #[must_use]
    pub fn new(id: u32, seed: u64) -> Self {
        Self {
            id,
            rng: StdRng::seed_from_u64(seed ^ u64::from(id)),
        }
    }

    /// Run one iteration: sample a template, generate parameters, acquire
    /// a session, execute, and record the outcome. Returns `false` when
    /// the worker should stop (cancellation observed).
    async fn run_once(&mut self, ctx: &WorkerContext) -> bool {
        if ctx.cancel.is_cancelled() {
            return false;
        }
        let template_pool = match &ctx.write_bias {
            Some(bias) => {
                let write_fraction = f64::from_bits(bias.target_write_fraction.load(Ordering::Relaxed));
                if self.rng.random_bool(write_fraction.clamp(0.0, 1.0)) {
                    &bias.writes
                } else {
                    &bias.reads
                }
            }
            None => &ctx.templates,
        };
        let template_id = template_pool.sample(&mut self.rng);
        let template = template_pool.get(template_id);
        let params = (template.generate)(&mut self.rng, &ctx.table_stats);

        let acquire_deadline = Instant::now() + STATEMENT_TIMEOUT;
        let session = match ctx.pool.acquire(acquire_deadline).await {
            Ok(session) => session,
            Err(pool::PoolError::AcquireTimeout) => {
                ctx.metrics.increment_error(template.name, domain::ErrorKind::PoolTimeout);
                return true;
            }
            Err(_) => {
                ctx.metrics.increment_error(template.name, domain::ErrorKind::Connection);
                return true;
            }
        };

        let start = Instant::now();
        let result = execute_template(session, template.sql, &params, STATEMENT_TIMEOUT).await;
        match result {
            Ok(()) => ctx.metrics.record_latency(template.name, start.elapsed().as_nanos() as u64),
            Err(err) => ctx.metrics.increment_error(template.name, classify_sqlx_error(&err)),
        }
        true
    }

    /// Worker identity, for diagnostics.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }
}

async fn execute_template(
    mut session: pool::Session,
    sql: &str,
    params: &[SqlParam],
    timeout: Duration,
) -> Result<(), sqlx::Error> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            SqlParam::I64(v) => query.bind(v),
            SqlParam::F64(v) => query.bind(v),
            SqlParam::Text(v) => query.bind(v),
            SqlParam::Uuid(v) => query.bind(v),
        };
    }
    tokio::time::timeout(timeout, query.execute(&mut *session))
        .await
        .unwrap_or(Err(sqlx::Error::PoolTimedOut))
        .map(|_| ())
}

/// Run a fixed-duration phase of `workers` workers against `ctx`,
/// returning once every worker has exited (deadline reached or
/// cancellation observed).
pub(crate) async fn run_phase(ctx: Arc<WorkerContext>, workers: u32, seed: u64, deadline: Instant) {
    let mut joins = tokio::task::JoinSet::new();
    for id in 0..workers {
        let ctx = Arc::clone(&ctx);
        joins.spawn(async move {
            let mut worker = Worker::new(id, seed);
            loop {
                if Instant::now() >= deadline || ctx.cancel.is_cancelled() {
                    break;
                }
                if !worker.run_once(&ctx).await {
                    break;
                }
            }
        });
    }
    while joins.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::Worker;
    use rand::Rng as _;

    #[test]
    fn workers_derive_independent_rngs() {
        let mut a = Worker::new(0, 42);
        let mut b = Worker::new(1, 42);
        let draw_a: u64 = a.rng.random();
        let draw_b: u64 = b.rng.random();
        assert_ne!(draw_a, draw_b);
    }

    #[test]
    fn same_id_and_seed_reproduces_draws() {
        let mut a = Worker::new(3, 7);
        let mut b = Worker::new(3, 7);
        let draw_a: u64 = a.rng.random();
        let draw_b: u64 = b.rng.random();
        assert_eq!(draw_a, draw_b);
    }
}
