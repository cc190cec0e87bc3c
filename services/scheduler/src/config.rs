use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub eval_interval: Duration,
    pub max_concurrent_evals: usize,
    pub snapshot_path: Option<PathBuf>,
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = lookup("CONVOY_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let eval_interval = Duration::from_secs(parse_or(&lookup, "CONVOY_EVAL_INTERVAL_SECS", 5)?);
        if eval_interval.is_zero() {
            anyhow::bail!("CONVOY_EVAL_INTERVAL_SECS must be at least 1");
        }

        let max_concurrent_evals = parse_or(&lookup, "CONVOY_MAX_CONCURRENT_EVALS", 8)?;
        if max_concurrent_evals == 0 {
            anyhow::bail!("CONVOY_MAX_CONCURRENT_EVALS must be at least 1");
        }

        let snapshot_path = lookup("CONVOY_SNAPSHOT_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let shutdown_timeout =
            Duration::from_secs(parse_or(&lookup, "CONVOY_SHUTDOWN_TIMEOUT_SECS", 10)?);

        Ok(Self {
            log_level,
            eval_interval,
            max_concurrent_evals,
            snapshot_path,
            shutdown_timeout,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
