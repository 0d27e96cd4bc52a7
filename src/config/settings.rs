use super::defaults::{
    DEFAULT_CONFIG_PATH, DEFAULT_DB_PATH, DEFAULT_MAX_MAPPINGS, DEFAULT_PORT,
    DEFAULT_PROGRESS_INTERVAL_MS, DEFAULT_SEARCH_TIMEOUT_SECS,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: String,
    pub config_path: String,
    /// Mappings to find before a run stops. 0 enumerates every feasible mapping.
    pub max_mappings: u64,
    /// Minimum milliseconds between progress snapshots of a running search.
    pub progress_interval_ms: u64,
    /// Wall-clock limit for one search. 0 disables the limit.
    pub search_timeout_secs: u64,
    /// Log every mapping found, not just the first.
    pub log_mappings: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: DEFAULT_DB_PATH.to_string(),
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            max_mappings: DEFAULT_MAX_MAPPINGS,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            search_timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            log_mappings: false,
        }
    }
}

impl AppConfig {
    /// Load configuration, merging defaults with config file values and env overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("CM_CONFIG_PATH") {
            config.config_path = path;
        }
        if let Ok(path) = std::env::var("CM_DB_PATH") {
            config.db_path = path;
        }
        if let Ok(port) = std::env::var("CM_PORT") {
            config.port = port.parse().context("CM_PORT must be a valid port number")?;
        }

        let cfg_path = Path::new(&config.config_path);
        if cfg_path.exists() {
            let contents = fs::read_to_string(cfg_path)
                .with_context(|| format!("Failed to read config file: {}", config.config_path))?;
            config.parse_ini(&contents);
        }

        config.validate()?;
        Ok(config)
    }

    pub(crate) const fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// `None` when searches may run forever.
    pub(crate) const fn search_timeout(&self) -> Option<Duration> {
        if self.search_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.search_timeout_secs))
        }
    }
}
