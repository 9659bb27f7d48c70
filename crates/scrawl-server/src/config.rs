use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::TimeDelta;

use scrawl_core::ScrawlConfig;
use scrawl_core::password::HashParams;

/// Server settings, read from `SCRAWL_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    /// `None` when `SCRAWL_SESSION_TTL_HOURS=0`.
    pub session_ttl: Option<TimeDelta>,
    pub purge_interval_secs: u64,
    pub hash_params: HashParams,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path: PathBuf = get("SCRAWL_DB_PATH")
            .unwrap_or_else(|| "scrawl.db".into())
            .into();
        let host = get("SCRAWL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&get, "SCRAWL_PORT", 8080)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

        let ttl_hours: i64 = parse_or(&get, "SCRAWL_SESSION_TTL_HOURS", 720)?;
        let session_ttl = match ttl_hours {
            0 => None,
            h if h > 0 => Some(TimeDelta::hours(h)),
            h => anyhow::bail!("SCRAWL_SESSION_TTL_HOURS must not be negative (got {})", h),
        };

        let defaults = HashParams::default();
        let hash_params = HashParams {
            memory_kib: parse_or(&get, "SCRAWL_ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&get, "SCRAWL_ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&get, "SCRAWL_ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        let purge_interval_secs: u64 = parse_or(&get, "SCRAWL_PURGE_INTERVAL_SECS", 3600)?;
        if purge_interval_secs == 0 {
            anyhow::bail!("SCRAWL_PURGE_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            db_path,
            addr,
            session_ttl,
            purge_interval_secs,
            hash_params,
        })
    }

    pub fn scrawl(&self) -> ScrawlConfig {
        ScrawlConfig {
            session_ttl: self.session_ttl,
            hash_params: self.hash_params,
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}
