//! Configuration loader for memory-injection
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use crate::process::{AttachBackoff, ProcessSelector};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_process")]
    pub process: ProcessConfig,

    #[serde(default = "default_service")]
    pub service: ServiceConfig,

    #[serde(default = "default_offsets")]
    pub offsets: OffsetsConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// How the process name is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Contains,
    Exact,
}

/// Target process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default = "default_process_name")]
    pub name: String,
    #[serde(default)]
    pub match_mode: MatchMode,
}

impl ProcessConfig {
    pub fn selector(&self) -> ProcessSelector {
        match self.match_mode {
            MatchMode::Contains => ProcessSelector::name_contains(&self.name),
            MatchMode::Exact => ProcessSelector::name_equals(&self.name),
        }
    }
}

/// Background loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_attach")]
    pub attach: AttachConfig,
}

impl ServiceConfig {
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        default_service()
    }
}

/// Attach retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_report_every")]
    pub report_every: u32,
}

impl AttachConfig {
    pub fn backoff(&self) -> AttachBackoff {
        AttachBackoff {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            report_every: self.report_every,
        }
    }
}

/// Offset file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetsConfig {
    #[serde(default = "default_local_offsets")]
    pub local: PathBuf,
    /// A newer copy fetched out of band, reconciled against `local`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults only when the file is missing
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from `path`, or defaults if it does not exist
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    ConfigLoader::new(path).load_or_default()
}

// Default functions for serde
fn default_process() -> ProcessConfig {
    ProcessConfig {
        name: default_process_name(),
        match_mode: MatchMode::default(),
    }
}

fn default_service() -> ServiceConfig {
    ServiceConfig {
        watch_interval_ms: default_watch_interval_ms(),
        tick_interval_ms: default_tick_interval_ms(),
        attach: default_attach(),
    }
}

fn default_attach() -> AttachConfig {
    AttachConfig {
        initial_delay_ms: default_initial_delay_ms(),
        max_delay_ms: default_max_delay_ms(),
        multiplier: default_multiplier(),
        report_every: default_report_every(),
    }
}

fn default_offsets() -> OffsetsConfig {
    OffsetsConfig {
        local: default_local_offsets(),
        update: None,
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
    }
}

// Individual field defaults
fn default_process_name() -> String {
    default_config().process.name
}

fn default_watch_interval_ms() -> u64 {
    default_config().service.watch_interval_ms
}

fn default_tick_interval_ms() -> u64 {
    default_config().service.tick_interval_ms
}

fn default_initial_delay_ms() -> u64 {
    default_config().service.attach_initial_delay_ms
}

fn default_max_delay_ms() -> u64 {
    default_config().service.attach_max_delay_ms
}

fn default_multiplier() -> f64 {
    default_config().service.attach_multiplier
}

fn default_report_every() -> u32 {
    default_config().service.attach_report_every
}

fn default_local_offsets() -> PathBuf {
    PathBuf::from(default_config().offsets.local)
}

fn default_log_level() -> String {
    default_config().logging.level
}

impl Default for Config {
    fn default() -> Self {
        Config {
            process: default_process(),
            service: default_service(),
            offsets: default_offsets(),
            logging: default_logging(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.process.name, "ffxiv_dx11");
        assert_eq!(config.process.match_mode, MatchMode::Contains);
        assert_eq!(config.service.tick_interval(), Duration::from_millis(16));
        assert_eq!(config.service.attach.backoff(), AttachBackoff::default());
    }

    #[test]
    fn test_load_missing_file() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let result = loader.load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_or_default() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let config = loader.load_or_default().unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_broken_file_is_not_replaced_by_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[service\nwatch_interval_ms = ").unwrap();

        let result = ConfigLoader::new(&config_path).load_or_default();
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let mut config = Config::default();
        config.offsets.update = Some(PathBuf::from("remote.json"));
        let loader = ConfigLoader::new(&config_path);

        loader.save(&config).unwrap();
        assert!(config_path.exists());

        let loaded = loader.load().unwrap();
        assert_eq!(loaded.process.name, config.process.name);
        assert_eq!(loaded.offsets.update, Some(PathBuf::from("remote.json")));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [process]
            name = "game.exe"
            match_mode = "exact"

            [service.attach]
            max_delay_ms = 1000
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.process.selector(), ProcessSelector::name_equals("game.exe"));
        assert_eq!(config.service.attach.max_delay_ms, 1000);
        // Check defaults are applied
        assert_eq!(config.service.attach.initial_delay_ms, 250);
        assert_eq!(config.service.watch_interval_ms, 100);
        assert_eq!(config.offsets.local, PathBuf::from("offsets.json"));
    }
}
