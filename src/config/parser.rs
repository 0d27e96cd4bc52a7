use super::settings::AppConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

fn parse_flag(value: &str) -> bool {
    matches!(value, "yes" | "true" | "1")
}

impl AppConfig {
    /// Parse the simple KEY="VALUE" config format. Unknown keys and
    /// unparseable values are ignored.
    pub(crate) fn parse_ini(&mut self, contents: &str) {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"');

            match key {
                "PORT" => {
                    if let Ok(v) = value.parse() {
                        self.port = v;
                    }
                }
                "MAX_MAPPINGS" => {
                    if let Ok(v) = value.parse() {
                        self.max_mappings = v;
                    }
                }
                "PROGRESS_INTERVAL_MS" => {
                    if let Ok(v) = value.parse() {
                        self.progress_interval_ms = v;
                    }
                }
                "SEARCH_TIMEOUT_SECS" => {
                    if let Ok(v) = value.parse() {
                        self.search_timeout_secs = v;
                    }
                }
                "LOG_MAPPINGS" => self.log_mappings = parse_flag(value),
                _ => {}
            }
        }
    }

    /// Render the config file contents.
    pub(crate) fn to_ini(&self) -> String {
        format!(
            r#"# cluster-mapper configuration
# Auto-generated; edit via the settings API
PORT="{}"
MAX_MAPPINGS="{}"
PROGRESS_INTERVAL_MS="{}"
SEARCH_TIMEOUT_SECS="{}"
LOG_MAPPINGS="{}"
"#,
            self.port,
            self.max_mappings,
            self.progress_interval_ms,
            self.search_timeout_secs,
            if self.log_mappings { "yes" } else { "no" },
        )
    }

    /// Save current config back to the config file.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = Path::new(&self.config_path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.config_path, self.to_ini())
            .with_context(|| format!("Failed to write config to {}", self.config_path))?;

        Ok(())
    }
}
