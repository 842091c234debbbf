//! Runtime configuration for the viewer and its engine task.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimulatorConfig {
    /// Engine tick cadence in milliseconds.
    pub frame_interval_ms: u64,
    /// Layout loaded at startup
    pub layout_path: Option<String>,
    /// Where the event log is written when the layout is saved.
    pub event_log_path: Option<String>,
    /// Default log level (`error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            layout_path: None,
            event_log_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl SimulatorConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `config_path` - Path to the config.toml file
    ///
    /// # Returns
    /// * `Ok(SimulatorConfig)` if the file was successfully loaded and parsed
    /// * `Err(String)` with a descriptive error message otherwise
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path).map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))?;
        if config.frame_interval_ms == 0 {
            return Err("frame-interval-ms must be positive".to_string());
        }
        Ok(config)
    }

    /// Like [`SimulatorConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(config_path: &Path) -> Result<Self, String> {
        if config_path.exists() { Self::load(config_path) } else { Ok(Self::default()) }
    }

    /// Derive the config path from a layout file path.
    ///
    /// Replaces the layout filename with "config.toml" in the same directory.
    pub fn config_path_from_layout(layout_path: &str) -> PathBuf {
        let layout = Path::new(layout_path);
        layout.parent().unwrap_or(Path::new(".")).join("config.toml")
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_keys() {
        let config = SimulatorConfig::parse(
            r#"
            frame-interval-ms = 33
            layout-path = "demos/office.json"
            log-level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.frame_interval_ms, 33);
        assert_eq!(config.layout_path.as_deref(), Some("demos/office.json"));
        assert_eq!(config.event_log_path, None);
        assert_eq!(config.log_level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(SimulatorConfig::parse("").unwrap(), SimulatorConfig::default());
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(SimulatorConfig::parse("frame-interval-ms = 0").is_err());
    }

    #[test]
    fn config_sits_next_to_layout() {
        assert_eq!(SimulatorConfig::config_path_from_layout("plans/office.json"), Path::new("plans").join("config.toml"));
        assert!(SimulatorConfig::load_or_default(Path::new("/no/such/config.toml")).is_ok());
    }
}
