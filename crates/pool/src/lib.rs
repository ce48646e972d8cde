//! Connection Pool Facade (C1): a bounded pool of database sessions with
//! a health probe and deadline-scoped acquisition.
//!
//! Wraps `sqlx::PgPool`. Callers acquire a [`Session`] and release it on
//! every exit path; [`Session`] does this automatically on drop, so
//! panics and early returns cannot leak a lease.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::instrument;

/// Errors surfaced by the pool facade.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The supplied configuration is invalid.
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// Initial connection or health-check failed.
    #[error("connectivity failure: {source}")]
    Connectivity {
        /// The underlying driver error.
        #[source]
        source: sqlx::Error,
    },
    /// Acquisition did not complete before its deadline.
    #[error("session acquisition exceeded its deadline")]
    AcquireTimeout,
    /// A statement failed on an acquired session.
    #[error("statement failed: {source}")]
    Statement {
        /// The underlying driver error.
        #[source]
        source: sqlx::Error,
    },
}

impl PoolError {
    /// Map to the §7 error taxonomy's `kind` label.
    #[must_use]
    pub fn kind(&self) -> domain::ErrorClass {
        match self {
            Self::InvalidConfig { .. } => domain::ErrorClass::Validation,
            Self::Connectivity { .. } => domain::ErrorClass::Connectivity,
            Self::AcquireTimeout => domain::ErrorClass::PoolTimeout,
            Self::Statement { .. } => domain::ErrorClass::Statement,
        }
    }
}

/// Pool sizing and lifetime configuration (§4.1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolConfig {
    /// Minimum idle connections kept warm.
    pub min: u32,
    /// Maximum connections ever opened.
    pub max: u32,
    /// How long an idle connection may sit before being closed.
    pub idle_timeout: Duration,
    /// Maximum lifetime of any single connection.
    pub max_lifetime: Duration,
    /// Interval between background health checks performed by the driver.
    pub health_check_period: Duration,
}

impl PoolConfig {
    /// Burst-mode sizing: `max = workers + 2` (§4.1).
    #[must_use]
    pub fn for_burst(workers: u32) -> Self {
        Self::with_max(workers + 2)
    }

    /// Simulation-mode sizing: `max = peak_workers + 4` (§4.1).
    #[must_use]
    pub fn for_simulation(peak_workers: u32) -> Self {
        Self::with_max(peak_workers + 4)
    }

    fn with_max(max: u32) -> Self {
        Self {
            min: 0,
            max,
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
            health_check_period: Duration::from_secs(30),
        }
    }

    /// Validate `min <= max` and `max >= 1`.
    ///
    /// # Errors
    /// Returns [`PoolError::InvalidConfig`] if the bounds are inconsistent.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "max must be >= 1".to_owned(),
            });
        }
        if self.min > self.max {
            return Err(PoolError::InvalidConfig {
                reason: format!("min ({}) must be <= max ({})", self.min, self.max),
            });
        }
        Ok(())
    }
}

/// Point-in-time pool utilization (§4.1 `stats()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently leased out to callers.
    pub acquired: u32,
    /// Connections open but idle.
    pub idle: u32,
    /// Configured maximum connections.
    pub max: u32,
}

/// A bounded facade over a driver-native connection pool.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    inner: PgPool,
    config: PoolConfig,
}

impl ConnectionPool {
    /// Connect to `database_url` and apply `config`'s sizing and lifetime
    /// bounds.
    ///
    /// # Errors
    /// Returns [`PoolError::InvalidConfig`] if `config` fails validation,
    /// or [`PoolError::Connectivity`] if the initial connection fails.
    #[instrument(skip(database_url), fields(max = config.max))]
    pub async fn connect(database_url: &str, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let inner = PgPoolOptions::new()
            .min_connections(config.min)
            .max_connections(config.max)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|source| PoolError::Connectivity { source })?;
        Ok(Self { inner, config })
    }

    /// Acquire a leased [`Session`], waiting at most until `deadline`.
    ///
    /// # Errors
    /// Returns [`PoolError::AcquireTimeout`] if no session becomes
    /// available before `deadline`, or [`PoolError::Statement`] on a
    /// driver-level acquisition failure.
    pub async fn acquire(&self, deadline: Instant) -> Result<Session, PoolError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let conn = tokio::time::timeout(remaining, self.inner.acquire())
            .await
            .map_err(|_| PoolError::AcquireTimeout)?
            .map_err(|source| PoolError::Statement { source })?;
        Ok(Session { conn })
    }

    /// Run a trivial probe query, waiting at most until `deadline`.
    ///
    /// # Errors
    /// Returns [`PoolError::Connectivity`] on timeout or driver failure.
    pub async fn health_check(&self, deadline: Instant) -> Result<(), PoolError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout(remaining, sqlx::query("SELECT 1").execute(&self.inner))
            .await
            .map_err(|_| PoolError::Connectivity {
                source: sqlx::Error::PoolTimedOut,
            })?
            .map_err(|source| PoolError::Connectivity { source })?;
        Ok(())
    }

    /// Current utilization snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let idle = self.inner.num_idle() as u32;
        let size = self.inner.size();
        PoolStats {
            acquired: size.saturating_sub(idle),
            idle,
            max: self.config.max,
        }
    }

    /// Raw pool handle, for crates that bind statements directly (e.g. the
    /// bulk loader's `COPY` path).
    #[must_use]
    pub fn raw(&self) -> &PgPool {
        &self.inner
    }

    /// Close the pool, waiting for outstanding connections to be released.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

/// A leased database session. `sqlx::pool::PoolConnection` already returns
/// itself to the driver's pool on drop; this wrapper exists so call sites
/// go through the facade's `Session` type rather than the driver type
/// directly, keeping the driver swappable behind this crate alone.
#[derive(Debug)]
pub struct Session {
    conn: sqlx::pool::PoolConnection<sqlx::Postgres>,
}

impl std::ops::Deref for Session {
    type Target = sqlx::pool::PoolConnection<sqlx::Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::PoolConfig;

    #[test]
    fn burst_sizing_adds_two() {
        let cfg = PoolConfig::for_burst(8);
        assert_eq!(cfg.max, 10);
    }

    #[test]
    fn simulation_sizing_adds_four() {
        let cfg = PoolConfig::for_simulation(16);
        assert_eq!(cfg.max, 20);
    }

    #[test]
    fn zero_max_is_invalid() {
        let cfg = PoolConfig {
            min: 0,
            max: 0,
            ..PoolConfig::for_burst(0)
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn min_exceeding_max_is_invalid() {
        let mut cfg = PoolConfig::for_burst(4);
        cfg.min = cfg.max + 1;
        assert!(cfg.validate().is_err());
    }
}
