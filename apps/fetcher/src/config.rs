use std::time::Duration;

pub const DB_PATH: &str = "METRICSDECK_DB_PATH";
pub const FETCH_TIMEOUT_MS: &str = "METRICSDECK_FETCH_TIMEOUT_MS";
pub const POLL_INTERVAL_SECS: &str = "METRICSDECK_POLL_INTERVAL_SECS";
pub const LOG_FORMAT: &str = "METRICSDECK_LOG_FORMAT";

const DEFAULT_DB_PATH: &str = "./db/metrics.db";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: String,
    pub fetch_timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Unparseable
    /// numbers fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup(DB_PATH)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.into());
        let fetch_timeout = lookup(FETCH_TIMEOUT_MS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        let poll_secs = lookup(POLL_INTERVAL_SECS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        let log_format = match lookup(LOG_FORMAT) {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            db_path,
            fetch_timeout,
            poll_interval: Duration::from_secs(poll_secs),
            log_format,
        }
    }
}
