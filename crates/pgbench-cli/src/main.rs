//! Thin CLI host for the benchmarking engine.
//!
//! Parses flags, assembles the engine-facing configuration structs,
//! drives the bulk loader and the chosen executor, and writes the JSON
//! report (and, in simulation mode, the timeline CSV). All scheduling,
//! metrics, and reporting logic lives in the library crates; this binary
//! only wires them together and handles process-level concerns (signal
//! handling, exit codes, logging setup).

mod templates;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::Parser;
use tracing::Instrument as _;

use domain::{DbConfig, PreloadConfig, SimulationProfile, TableStats, WorkloadMode};
use executor::{BurstConfig, BurstExecutor, SimulationConfig, SimulationExecutor};
use metrics::MetricsAggregator;
use pool::{ConnectionPool, PoolConfig};

/// Exit codes (§6): `0` success, non-zero on validation or unrecoverable
/// failure.
const EXIT_VALIDATION_ERROR: i32 = 2;
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "pgbench", about = "Postgres-compatible workload generator and reporter")]
struct Cli {
    /// Database host.
    #[arg(long, env = "PGBENCH_DB_HOST", default_value = "localhost")]
    db_host: String,
    /// Database port.
    #[arg(long, env = "PGBENCH_DB_PORT", default_value_t = 5432)]
    db_port: u16,
    /// Database user.
    #[arg(long, env = "PGBENCH_DB_USER", default_value = "postgres")]
    db_user: String,
    /// Database password.
    #[arg(long, env = "PGBENCH_DB_PASSWORD", default_value = "")]
    db_password: String,
    /// Database name.
    #[arg(long, env = "PGBENCH_DB_NAME", default_value = "pgbench")]
    db_name: String,
    /// `sslmode` connection parameter.
    #[arg(long, env = "PGBENCH_DB_SSLMODE", default_value = "disable")]
    db_sslmode: String,

    /// `burst` or `simulation`.
    #[arg(long, default_value = "burst")]
    mode: String,
    /// Profile file path (YAML parsing is out of scope; only the
    /// built-in template catalogue is used at this layer).
    #[arg(long, default_value = "default")]
    profile: String,
    /// Run duration in seconds (burst: wall clock; simulation: logical).
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,
    /// Warmup duration in seconds.
    #[arg(long, default_value_t = 5)]
    warmup_secs: u64,
    /// Cooldown duration in seconds (burst mode only).
    #[arg(long, default_value_t = 5)]
    cooldown_secs: u64,
    /// Worker count.
    #[arg(long, default_value_t = 4)]
    workers: u32,
    /// Master RNG seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Time-compression scale, `1..=24` (simulation mode only).
    #[arg(long, default_value_t = 1)]
    scale: u8,
    /// Storage cap for the timeline, as a human-readable size
    /// (`"1KB"`, `"10MB"`, ...). Unset disables the cap.
    #[arg(long)]
    max_storage: Option<String>,

    /// Run the bulk loader before executing the workload.
    #[arg(long)]
    preload: bool,
    /// Target dataset size for `--preload` (e.g. `"1GB"`).
    #[arg(long, default_value = "1GB")]
    preload_size: String,
    /// Parallel workers for the transactions table load.
    #[arg(long, default_value_t = 4)]
    preload_parallelism: usize,

    /// Output report path.
    #[arg(long, default_value = "report.json")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!("pgbench.fatal: {err:#}");
            std::process::exit(
                if err.downcast_ref::<domain::SizeParseError>().is_some() {
                    EXIT_VALIDATION_ERROR
                } else {
                    EXIT_RUNTIME_ERROR
                },
            );
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mode = match cli.mode.as_str() {
        "burst" => WorkloadMode::Burst,
        "simulation" => WorkloadMode::Simulation,
        other => anyhow::bail!("unknown mode {other:?}; expected \"burst\" or \"simulation\""),
    };

    let db_config = DbConfig {
        host: cli.db_host,
        port: cli.db_port,
        user: cli.db_user,
        password: cli.db_password,
        dbname: cli.db_name,
        ssl_mode: cli.db_sslmode,
    };

    let max_storage_bytes = cli
        .max_storage
        .as_deref()
        .map(domain::parse_size)
        .transpose()
        .context("invalid --max-storage value")?;

    let pool_config = match mode {
        WorkloadMode::Burst => PoolConfig::for_burst(cli.workers),
        WorkloadMode::Simulation => PoolConfig::for_simulation(cli.workers),
    };
    let pool = ConnectionPool::connect(&db_config.to_url(), pool_config)
        .await
        .context("failed to connect to the database")?;

    let health_deadline = Instant::now() + Duration::from_secs(10);
    pool.health_check(health_deadline)
        .await
        .context("database health check failed")?;

    if cli.preload {
        let preload_config = PreloadConfig {
            target_size_bytes: domain::parse_size(&cli.preload_size)
                .context("invalid --preload-size value")?,
            parallelism: cli.preload_parallelism,
            seed: cli.seed,
        };
        tracing::info!("pgbench.preload: starting bulk load");
        let stats = loader::load_dataset(&pool, &preload_config, None)
            .await
            .context("bulk load failed")?;
        tracing::info!(
            duration_sec = stats.duration.as_secs_f64(),
            "pgbench.preload: complete"
        );
    }

    let table_stats = read_table_stats(&pool).await?;
    let templates = Arc::new(templates::builtin_templates());
    let metrics = MetricsAggregator::new();

    let start_time = chrono::Utc::now();
    let report = match mode {
        WorkloadMode::Burst => {
            run_burst(&cli, &pool, &metrics, templates, table_stats, start_time).await?
        }
        WorkloadMode::Simulation => {
            run_simulation(&cli, &pool, &metrics, templates, table_stats, max_storage_bytes, start_time)
                .await?
        }
    };

    let json = serde_json::to_string_pretty(&report).context("failed to serialise report")?;
    tokio::fs::write(&cli.output, json)
        .await
        .with_context(|| format!("failed to write report to {}", cli.output.display()))?;

    pool.close().await;
    Ok(())
}

async fn read_table_stats(pool: &ConnectionPool) -> anyhow::Result<TableStats> {
    async fn count(pool: &ConnectionPool, table: &str) -> anyhow::Result<u64> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut session = pool.acquire(deadline).await?;
        let row: (i64,) = sqlx::query_as(&format!("SELECT count(*) FROM {table}"))
            .fetch_one(&mut *session)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        Ok(row.0.max(0) as u64)
    }

    Ok(TableStats::new(
        count(pool, "account_types").await?,
        count(pool, "customers").await?,
        count(pool, "branches").await?,
        count(pool, "accounts").await?,
        count(pool, "transactions").await?,
    ))
}

async fn run_burst(
    cli: &Cli,
    pool: &ConnectionPool,
    metrics: &MetricsAggregator,
    templates: Arc<domain::WeightedTemplates>,
    table_stats: TableStats,
    start_time: chrono::DateTime<chrono::Utc>,
) -> anyhow::Result<report::Report> {
    let executor = BurstExecutor::new(pool.clone(), metrics.clone(), templates, table_stats);
    let cancel = executor.cancellation_token();

    let config = BurstConfig {
        workers: cli.workers,
        warmup: Duration::from_secs(cli.warmup_secs),
        measured: Duration::from_secs(cli.duration_secs),
        cooldown: Duration::from_secs(cli.cooldown_secs),
        seed: cli.seed,
    };

    let run_future = executor.run(config).instrument(tracing::info_span!("burst"));
    tokio::pin!(run_future);
    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("pgbench.shutdown: ctrl_c received, cancelling run");
                cancel.cancel();
            }
            result = &mut run_future => break result?,
        }
    };

    let end_time = chrono::Utc::now();
    let run_meta = report::RunMetadata {
        start_time,
        end_time,
        mode: "burst".to_owned(),
        profile: cli.profile.clone(),
        seed: cli.seed,
        workers: cli.workers,
        connections: PoolConfig::for_burst(cli.workers).max,
    };
    Ok(report::build_report(&outcome.snapshot, &run_meta, None))
}

async fn run_simulation(
    cli: &Cli,
    pool: &ConnectionPool,
    metrics: &MetricsAggregator,
    templates: Arc<domain::WeightedTemplates>,
    table_stats: TableStats,
    max_storage_bytes: Option<u64>,
    start_time: chrono::DateTime<chrono::Utc>,
) -> anyhow::Result<report::Report> {
    let profile = default_profile(&cli.profile);
    let executor =
        SimulationExecutor::new(pool.clone(), metrics.clone(), templates, table_stats, profile.clone());
    let cancel = executor.cancellation_token();

    let config = SimulationConfig {
        sim_duration: Duration::from_secs(cli.duration_secs),
        warmup: Duration::from_secs(cli.warmup_secs),
        scale: cli.scale,
        peak_workers: cli.workers,
        seed: cli.seed,
        max_storage_bytes,
    };
    let clock: Arc<dyn domain::Clock> = if cli.scale > 1 {
        Arc::new(domain::SimulatedClock::new(cli.scale))
    } else {
        Arc::new(domain::RealClock::new())
    };

    let run_future = executor.run(config, clock).instrument(tracing::info_span!("simulation"));
    tokio::pin!(run_future);
    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("pgbench.shutdown: ctrl_c received, cancelling run");
                cancel.cancel();
            }
            result = &mut run_future => break result?,
        }
    };

    if !outcome.timeline.is_empty() {
        let csv = report::timeline_csv(&outcome.timeline);
        let csv_path = cli.output.with_extension("timeline.csv");
        tokio::fs::write(&csv_path, csv)
            .await
            .with_context(|| format!("failed to write timeline to {}", csv_path.display()))?;
    }

    let end_time = chrono::Utc::now();
    let run_meta = report::RunMetadata {
        start_time,
        end_time,
        mode: "simulation".to_owned(),
        profile: cli.profile.clone(),
        seed: cli.seed,
        workers: cli.workers,
        connections: PoolConfig::for_simulation(cli.workers).max,
    };
    let sim_meta = report::SimulationMetadata {
        time_scale: cli.scale,
        end_sim_time: outcome.simulated_duration.as_secs() as i64,
        real_duration: outcome.real_duration,
        profile_used: profile.name,
        clock_mode: if cli.scale > 1 { "simulated" } else { "real" }.to_owned(),
        events: outcome.events_triggered,
        storage_used_bytes: estimate_storage_used(&outcome.timeline),
    };
    Ok(report::build_report(&outcome.snapshot, &run_meta, Some(&sim_meta)))
}

fn estimate_storage_used(timeline: &[domain::TimelineInterval]) -> u64 {
    timeline.len() as u64 * 96
}

/// A minimal always-on activity curve, standing in for the YAML profile
/// parser this layer does not own (§1 Non-goals).
fn default_profile(name: &str) -> SimulationProfile {
    let mut curve = std::collections::HashMap::new();
    curve.insert(
        "00:00".to_owned(),
        domain::ActivityPoint {
            base_qps: 50.0,
            read_write_split: 0.8,
            burstiness: 1.0,
        },
    );
    SimulationProfile {
        name: name.to_owned(),
        version: "1".to_owned(),
        curve,
        events: Vec::new(),
    }
}
