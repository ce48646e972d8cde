//! Consumed configuration shapes (§6). The file/flag parser that
//! populates these is out of scope (spec §1); the core only consumes the
//! resulting structs, hence `serde::Deserialize`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `db.*` connection settings. Environment overrides take precedence over
/// file values at the (out-of-scope) configuration-loading layer; this
/// struct is simply the result of that resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub dbname: String,
    /// `sslmode` connection parameter (e.g. `"disable"`, `"require"`).
    pub ssl_mode: String,
}

impl DbConfig {
    /// Render a `postgres://` connection URL from the individual fields.
    #[must_use]
    pub fn to_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            urlencode(&self.user),
            urlencode(&self.password),
            self.host,
            self.port,
            self.dbname,
            self.ssl_mode,
        )
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Execution mode. Per Design Note §9(b), both modes are valid config
/// (the source's narrower burst-only validator is not replicated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadMode {
    /// Fixed-duration maximum-throughput run with warmup/cooldown.
    Burst,
    /// Time-compressed run following a profile curve and events.
    Simulation,
}

/// `workload.*` settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Burst or simulation.
    pub mode: WorkloadMode,
    /// Profile name (resolved externally to a [`crate::profile::SimulationProfile`]).
    pub profile: String,
    /// Total run duration (burst: wall clock; simulation: logical time).
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Warmup phase duration.
    #[serde(with = "duration_secs")]
    pub warmup: Duration,
    /// Cooldown phase duration (burst mode only).
    #[serde(with = "duration_secs")]
    pub cooldown: Duration,
    /// Pool connection ceiling hint (actual max is computed by the
    /// executor per §4.1: `workers + 2` burst, `peak_workers + 4` sim).
    pub connections: u32,
    /// Worker count (burst: fixed; simulation: peak/initial).
    pub workers: u32,
    /// Master RNG seed.
    pub seed: u64,
    /// Time-compression scale, `1..=24` (simulation mode only).
    #[serde(default = "default_scale")]
    pub scale: u8,
}

fn default_scale() -> u8 {
    1
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

/// `output.*` settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination path for the JSON report (and timeline CSV, same stem).
    pub file: String,
    /// Output format tag (rendering is out of scope; this is passed
    /// through to the external renderer).
    pub format: String,
}

/// Top-level configuration the core consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[allow(missing_docs)]
    pub db: DbConfig,
    #[allow(missing_docs)]
    pub workload: WorkloadConfig,
    #[allow(missing_docs)]
    pub output: OutputConfig,
}

/// Bulk-loader sizing configuration (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadConfig {
    /// Target size of the loaded dataset, in bytes.
    pub target_size_bytes: u64,
    /// Number of parallel workers used for the transactions table.
    pub parallelism: usize,
    /// Global RNG seed; per-table and per-worker seeds derive from this.
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::DbConfig;

    #[test]
    fn to_url_percent_encodes_credentials() {
        let cfg = DbConfig {
            host: "localhost".to_owned(),
            port: 5432,
            user: "bench user".to_owned(),
            password: "p@ss".to_owned(),
            dbname: "bench".to_owned(),
            ssl_mode: "disable".to_owned(),
        };
        let url = cfg.to_url();
        assert!(url.contains("bench%20user"));
        assert!(url.contains("p%40ss"));
    }
}
