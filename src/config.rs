//! Configuration Module
//!
//! Handles loading agent configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::queue::{BackoffPolicy, QueueSettings};

/// Agent configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Total byte budget of the response cache
    pub cache_capacity_bytes: usize,
    /// TTL in seconds for entries stored without one
    pub default_ttl: u64,
    /// Seconds between background drains
    pub drain_interval: u64,
    /// Default retry ceiling per queued operation
    pub max_attempts: u32,
    /// Backoff base delay in milliseconds
    pub retry_base_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub retry_max_delay_ms: u64,
    pub retry_multiplier: f64,
    pub retry_jitter: bool,
    /// Per-operation transport timeout in seconds
    pub execute_timeout: u64,
    /// Directory holding the durable snapshots
    pub data_dir: PathBuf,
    /// Control API port
    pub server_port: u16,
    /// Base URL that queued operations are replayed against
    pub upstream_url: String,
    /// Health endpoint path on the upstream
    pub health_path: String,
    /// Seconds between health probes
    pub probe_interval: u64,
    pub probe_timeout_ms: u64,
    /// Keys fetched as critical entries at startup
    pub prefetch_keys: Vec<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY_BYTES` - cache byte budget (default: 5 MiB)
    /// - `DEFAULT_TTL_SECS` - default TTL (default: 300)
    /// - `DRAIN_INTERVAL_SECS` - background drain cadence (default: 30)
    /// - `MAX_ATTEMPTS` - retry ceiling (default: 3)
    /// - `RETRY_BASE_DELAY_MS` / `RETRY_MAX_DELAY_MS` / `RETRY_MULTIPLIER` / `RETRY_JITTER`
    ///   - backoff (defaults: 1000 / 30000 / 2.0 / true)
    /// - `EXECUTE_TIMEOUT_SECS` - per-operation timeout (default: 30)
    /// - `DATA_DIR` - snapshot directory (default: ./offline-data)
    /// - `SERVER_PORT` - control API port (default: 3000)
    /// - `UPSTREAM_URL` - upstream base URL (default: http://127.0.0.1:8080)
    /// - `HEALTH_PATH` - health endpoint (default: /api/health)
    /// - `PROBE_INTERVAL_SECS` / `PROBE_TIMEOUT_MS` - health probe (defaults: 30 / 5000)
    /// - `PREFETCH_KEYS` - comma-separated keys (default: none)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_capacity_bytes: parse_positive("CACHE_CAPACITY_BYTES")
                .unwrap_or(defaults.cache_capacity_bytes),
            default_ttl: parse_positive("DEFAULT_TTL_SECS").unwrap_or(defaults.default_ttl),
            drain_interval: parse_positive::<u64>("DRAIN_INTERVAL_SECS")
                .unwrap_or(defaults.drain_interval),
            max_attempts: parse_positive::<u32>("MAX_ATTEMPTS")
                .unwrap_or(defaults.max_attempts),
            retry_base_delay_ms: parse_env("RETRY_BASE_DELAY_MS")
                .unwrap_or(defaults.retry_base_delay_ms),
            retry_max_delay_ms: parse_env("RETRY_MAX_DELAY_MS")
                .unwrap_or(defaults.retry_max_delay_ms),
            retry_multiplier: parse_env::<f64>("RETRY_MULTIPLIER")
                .filter(|v| *v >= 1.0)
                .unwrap_or(defaults.retry_multiplier),
            retry_jitter: parse_env("RETRY_JITTER").unwrap_or(defaults.retry_jitter),
            execute_timeout: parse_positive::<u64>("EXECUTE_TIMEOUT_SECS")
                .unwrap_or(defaults.execute_timeout),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            health_path: env::var("HEALTH_PATH").unwrap_or(defaults.health_path),
            probe_interval: parse_positive::<u64>("PROBE_INTERVAL_SECS")
                .unwrap_or(defaults.probe_interval),
            probe_timeout_ms: parse_env("PROBE_TIMEOUT_MS").unwrap_or(defaults.probe_timeout_ms),
            prefetch_keys: env::var("PREFETCH_KEYS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.prefetch_keys),
        }
    }

    /// Queue behaviour derived from the retry settings.
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            max_attempts: self.max_attempts,
            backoff: BackoffPolicy {
                base: Duration::from_millis(self.retry_base_delay_ms),
                max: Duration::from_millis(self.retry_max_delay_ms),
                multiplier: self.retry_multiplier,
                jitter: self.retry_jitter,
            },
            execute_timeout: Duration::from_secs(self.execute_timeout),
        }
    }

    /// Full URL of the upstream health endpoint.
    pub fn health_url(&self) -> String {
        format!(
            "{}/{}",
            self.upstream_url.trim_end_matches('/'),
            self.health_path.trim_start_matches('/')
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity_bytes: 5 * 1024 * 1024,
            default_ttl: 300,
            drain_interval: 30,
            max_attempts: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            retry_multiplier: 2.0,
            retry_jitter: true,
            execute_timeout: 30,
            data_dir: PathBuf::from("./offline-data"),
            server_port: 3000,
            upstream_url: "http://127.0.0.1:8080".to_string(),
            health_path: "/api/health".to_string(),
            probe_interval: 30,
            probe_timeout_ms: 5_000,
            prefetch_keys: Vec::new(),
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Like `parse_env`, treating zero as unset.
fn parse_positive<T: FromStr + PartialOrd + Default>(name: &str) -> Option<T> {
    parse_env::<T>(name).filter(|v| *v > T::default())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
