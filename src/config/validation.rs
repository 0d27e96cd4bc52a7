use super::settings::AppConfig;
use anyhow::Result;

/// Snapshots more often than this would dominate the search loop.
const MIN_PROGRESS_INTERVAL_MS: u64 = 50;

impl AppConfig {
    /// Validate configuration values are sane.
    pub(crate) fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.port > 0, "Port must be > 0");
        anyhow::ensure!(!self.db_path.is_empty(), "db_path must not be empty");
        anyhow::ensure!(
            self.progress_interval_ms >= MIN_PROGRESS_INTERVAL_MS,
            "progress_interval_ms must be at least {MIN_PROGRESS_INTERVAL_MS}"
        );
        Ok(())
    }
}
