//! Pipeline configuration from environment variables

use crate::streamer_core::RetryPolicy;
use std::env;
use std::time::Duration;

pub const DEFAULT_STREAM_URL: &str = "wss://stream.aisstream.io/v0/stream";

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for one ingestion + aggregation cycle
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// aisstream.io API key
    pub api_key: String,

    /// WebSocket endpoint of the feed
    pub stream_url: String,

    /// Path to SQLite database file
    pub db_path: String,

    /// Streaming budget per session in seconds
    pub session_duration_secs: u64,

    /// Retries after the first failed session attempt
    pub max_retries: u32,

    /// Fixed delay between session attempts in seconds
    pub retry_delay_secs: u64,

    /// Outer wall-clock limit per session attempt in seconds
    pub session_timeout_secs: u64,

    /// Interval between cycles in `--loop` mode, in seconds
    pub cycle_interval_secs: u64,

    pub rust_log: String,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `AISSTREAM_API_KEY` (required)
    /// - `AIS_STREAM_URL` (default: wss://stream.aisstream.io/v0/stream)
    /// - `AIS_DB_PATH` (default: data/aisflow.db)
    /// - `SESSION_DURATION_SECS` (default: 60)
    /// - `SESSION_MAX_RETRIES` (default: 3)
    /// - `SESSION_RETRY_DELAY_SECS` (default: 5)
    /// - `SESSION_TIMEOUT_SECS` (default: 300)
    /// - `CYCLE_INTERVAL_SECS` (default: 300)
    /// - `RUST_LOG` (default: info)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("AISSTREAM_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVariable("AISSTREAM_API_KEY".to_string()))?;

        let stream_url = env::var("AIS_STREAM_URL").unwrap_or_else(|_| DEFAULT_STREAM_URL.to_string());
        if !stream_url.starts_with("ws://") && !stream_url.starts_with("wss://") {
            return Err(ConfigError::InvalidValue(
                "AIS_STREAM_URL must start with ws:// or wss://".to_string(),
            ));
        }

        let config = Self {
            api_key,
            stream_url,
            db_path: env::var("AIS_DB_PATH").unwrap_or_else(|_| "data/aisflow.db".to_string()),
            session_duration_secs: parse_or("SESSION_DURATION_SECS", 60)?,
            max_retries: parse_or("SESSION_MAX_RETRIES", 3)?,
            retry_delay_secs: parse_or("SESSION_RETRY_DELAY_SECS", 5)?,
            session_timeout_secs: parse_or("SESSION_TIMEOUT_SECS", 300)?,
            cycle_interval_secs: parse_or("CYCLE_INTERVAL_SECS", 300)?,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_duration_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_DURATION_SECS must be greater than 0".to_string(),
            ));
        }

        if self.session_timeout_secs <= self.session_duration_secs {
            return Err(ConfigError::InvalidValue(format!(
                "SESSION_TIMEOUT_SECS ({}) must exceed SESSION_DURATION_SECS ({})",
                self.session_timeout_secs, self.session_duration_secs
            )));
        }

        if self.cycle_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "CYCLE_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.saturating_add(1),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            attempt_timeout: Duration::from_secs(self.session_timeout_secs),
        }
    }
}

/// Unset → default; set but unparseable → error (a typo shouldn't silently
/// fall back to the default budget)
fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} is not a valid number: {}", var, raw))),
        Err(_) => Ok(default),
    }
}
