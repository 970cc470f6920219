//! Runtime configuration from environment variables
//!
//! Environment variables:
//! - `CALLFLOW_BACKEND` (default: sqlite) - `sqlite` or `memory`
//! - `CALLFLOW_DB_PATH` (default: data/callflow.db)
//! - `CALLFLOW_EVENTS_PATH` (default: streams/interactions.jsonl)
//! - `CALLFLOW_SNAPSHOT_PATH` (optional) - memory backend load/save file
//! - `CALLFLOW_FOLLOW` (default: false) - keep tailing the feed after EOF
//! - `INGEST_CHANNEL_BUFFER` (default: 10000)
//! - `STATS_LOG_INTERVAL_SECS` (default: 10)
//! - `RUST_LOG` (default: info)

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Memory,
    Sqlite,
}

impl BackendType {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Ok(BackendType::Memory),
            "sqlite" => Ok(BackendType::Sqlite),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown backend '{}' (expected sqlite or memory)",
                other
            ))),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub backend: BackendType,
    pub db_path: PathBuf,
    pub events_path: PathBuf,
    pub snapshot_path: Option<PathBuf>,
    pub follow: bool,
    pub channel_buffer: usize,
    pub stats_interval_secs: u64,
    pub rust_log: String,
}

fn parse_or<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}='{}'", name, raw))),
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable lookup (tests pass a map instead of the process env)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("CALLFLOW_BACKEND") {
            Some(value) => BackendType::parse(&value)?,
            None => BackendType::Sqlite,
        };

        let channel_buffer = parse_or(
            "INGEST_CHANNEL_BUFFER",
            lookup("INGEST_CHANNEL_BUFFER"),
            10_000usize,
        )?;
        if channel_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "INGEST_CHANNEL_BUFFER must be greater than 0".to_string(),
            ));
        }

        let stats_interval_secs = parse_or(
            "STATS_LOG_INTERVAL_SECS",
            lookup("STATS_LOG_INTERVAL_SECS"),
            10u64,
        )?;
        if stats_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "STATS_LOG_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            backend,
            db_path: lookup("CALLFLOW_DB_PATH")
                .unwrap_or_else(|| "data/callflow.db".to_string())
                .into(),
            events_path: lookup("CALLFLOW_EVENTS_PATH")
                .unwrap_or_else(|| "streams/interactions.jsonl".to_string())
                .into(),
            snapshot_path: lookup("CALLFLOW_SNAPSHOT_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            follow: parse_or("CALLFLOW_FOLLOW", lookup("CALLFLOW_FOLLOW"), false)?,
            channel_buffer,
            stats_interval_secs,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Apply `--backend <sqlite|memory>` from the command line, if present
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        if let Some(idx) = args.iter().position(|x| x == "--backend") {
            let value = args.get(idx + 1).ok_or_else(|| {
                ConfigError::InvalidValue("--backend requires a value".to_string())
            })?;
            self.backend = BackendType::parse(value)?;
        }
        Ok(())
    }
}
