//! Bulk Loader (C3): parallel CSV generation streamed through `COPY` for
//! the five benchmark-schema tables (§4.3).
//!
//! Loading order respects referential integrity: `account_types` →
//! `branches` → `customers` → `accounts` → `transactions`. Each table's
//! rows are produced by a [`csv::RowGenerator`] seeded deterministically
//! from the caller's global seed, and streamed to Postgres via
//! `COPY ... FROM STDIN (FORMAT csv)` on a leased session.

mod csv;
mod sizing;

pub use sizing::{estimate_table_stats, ACCOUNT_TYPE_COUNT};

use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::instrument;

use csv::RowGenerator;
use domain::{PreloadConfig, TableStats};
use pool::ConnectionPool;

/// Errors surfaced by the bulk loader.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Acquiring a session for a loader worker failed.
    #[error("pool error: {0}")]
    Pool(#[from] pool::PoolError),
    /// The `COPY` stream itself failed (constraint violation, disk full,
    /// connection drop mid-stream).
    #[error("copy stream failed for table {table}: {source}")]
    Copy {
        /// The table being loaded when the failure occurred.
        table: &'static str,
        /// The underlying driver error.
        #[source]
        source: sqlx::Error,
    },
}

/// Reports loader progress; emitted every [`PROGRESS_INTERVAL_ROWS`] rows
/// per the §4.3 progress callback, modelled as a channel rather than a
/// callback (Design Note §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    /// Table currently being loaded.
    pub table: &'static str,
    /// Rows written so far for this table.
    pub rows_done: u64,
    /// Total rows planned for this table.
    pub rows_total: u64,
}

const PROGRESS_INTERVAL_ROWS: u64 = 100_000;

/// Outcome of a completed load (§3 "Preload config & stats").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Final row counts per table.
    pub table_stats: TableStats,
    /// Total wall-clock duration of the load.
    pub duration: std::time::Duration,
}

/// Stream `row_count` CSV rows produced by `generate` into `table` via
/// `COPY ... FROM STDIN` on a freshly leased session.
async fn copy_table<F>(
    pool: &ConnectionPool,
    table: &'static str,
    columns: &str,
    row_count: u64,
    progress: Option<&mpsc::UnboundedSender<LoadProgress>>,
    mut generate: F,
) -> Result<(), LoaderError>
where
    F: FnMut(u64) -> String,
{
    let deadline = Instant::now() + std::time::Duration::from_secs(3600);
    let mut session = pool.acquire(deadline).await?;
    let sql = format!("COPY {table} ({columns}) FROM STDIN WITH (FORMAT csv)");
    let mut sink = session
        .copy_in_raw(&sql)
        .await
        .map_err(|source| LoaderError::Copy { table, source })?;

    let mut buf = String::with_capacity(64 * 1024);
    for i in 0..row_count {
        buf.push_str(&generate(i));
        if buf.len() >= 64 * 1024 {
            sink.send(buf.as_bytes())
                .await
                .map_err(|source| LoaderError::Copy { table, source })?;
            buf.clear();
        }
        if let Some(tx) = progress {
            if (i + 1) % PROGRESS_INTERVAL_ROWS == 0 {
                let _ = tx.send(LoadProgress {
                    table,
                    rows_done: i + 1,
                    rows_total: row_count,
                });
            }
        }
    }
    if !buf.is_empty() {
        sink.send(buf.as_bytes())
            .await
            .map_err(|source| LoaderError::Copy { table, source })?;
    }
    sink.finish()
        .await
        .map_err(|source| LoaderError::Copy { table, source })?;
    if let Some(tx) = progress {
        let _ = tx.send(LoadProgress {
            table,
            rows_done: row_count,
            rows_total: row_count,
        });
    }
    Ok(())
}

/// Load the full dataset: static reference data, then branches,
/// customers, and accounts sequentially, then transactions in parallel
/// across `config.parallelism` workers.
///
/// # Errors
/// Returns the first [`LoaderError`] encountered; per §4.3 a parallel
/// transaction-loader worker's failure cancels the remaining workers'
/// shared deadline and the first error is returned. Any rows already
/// written are left in the database (caller-owned cleanup).
#[instrument(skip(pool, progress), fields(target_bytes = config.target_size_bytes))]
pub async fn load_dataset(
    pool: &ConnectionPool,
    config: &PreloadConfig,
    progress: Option<mpsc::UnboundedSender<LoadProgress>>,
) -> Result<LoadStats, LoaderError> {
    let start = Instant::now();
    let stats = estimate_table_stats(config.target_size_bytes);

    copy_table(
        pool,
        "account_types",
        "account_type_id,name,description",
        stats.account_types,
        progress.as_ref(),
        {
            let mut gen = RowGenerator::new(config.seed);
            move |i| gen.account_type_row(i)
        },
    )
    .await?;

    copy_table(pool, "branches", "branch_id,name,city,region", stats.branches, progress.as_ref(), {
        let mut gen = RowGenerator::new(config.seed + 1);
        move |i| gen.branch_row(i)
    })
    .await?;

    copy_table(
        pool,
        "customers",
        "customer_id,first_name,last_name,email,branch_id",
        stats.customers,
        progress.as_ref(),
        {
            let mut gen = RowGenerator::new(config.seed + 2);
            let branch_count = stats.branches;
            move |i| gen.customer_row(i, branch_count)
        },
    )
    .await?;

    copy_table(
        pool,
        "accounts",
        "account_id,customer_id,account_type_id,balance,opened_at",
        stats.accounts,
        progress.as_ref(),
        {
            let mut gen = RowGenerator::new(config.seed + 3);
            let customer_count = stats.customers;
            let account_type_count = stats.account_types;
            move |i| gen.account_row(i, customer_count, account_type_count)
        },
    )
    .await?;

    load_transactions_parallel(pool, config, stats, progress.as_ref()).await?;

    Ok(LoadStats {
        table_stats: stats,
        duration: start.elapsed(),
    })
}

/// Load `transactions` in parallel across `config.parallelism` workers,
/// each with its own seed (`global_seed + worker + 100`, §4.3) and its
/// own leased session. The row count is partitioned into contiguous
/// ranges; because partition boundaries are computed by division with
/// remainder distributed to the first workers, total rows loaded is
/// never less than the estimate.
async fn load_transactions_parallel(
    pool: &ConnectionPool,
    config: &PreloadConfig,
    stats: TableStats,
    progress: Option<&mpsc::UnboundedSender<LoadProgress>>,
) -> Result<(), LoaderError> {
    let parallelism = config.parallelism.max(1) as u64;
    let base = stats.transactions / parallelism;
    let remainder = stats.transactions % parallelism;

    let mut joins = JoinSet::new();
    let mut start_index = 0u64;
    for worker in 0..parallelism {
        let rows_for_worker = base + u64::from(worker < remainder);
        let worker_seed = config.seed + worker + 100;
        let account_count = stats.accounts;
        let pool = pool.clone();
        let progress = progress.cloned();
        let worker_start = start_index;
        start_index += rows_for_worker;

        joins.spawn(async move {
            copy_table(
                &pool,
                "transactions",
                "transaction_id,account_id,amount,kind,occurred_at",
                rows_for_worker,
                progress.as_ref(),
                {
                    let mut gen = RowGenerator::new(worker_seed);
                    move |i| gen.transaction_row(worker_start + i, account_count)
                },
            )
            .await
        });
    }

    let mut first_error = None;
    while let Some(result) = joins.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
                joins.abort_all();
            }
            Err(join_err) => {
                tracing::error!("transaction loader worker panicked: {join_err}");
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::csv::RowGenerator;

    #[test]
    fn transaction_rows_reference_valid_account_range() {
        let mut gen = RowGenerator::new(42);
        for i in 0..100 {
            let row = gen.transaction_row(i, 500);
            let account_id: u64 = row.split(',').nth(1).unwrap().parse().unwrap();
            assert!(account_id >= 1 && account_id <= 500);
        }
    }
}
