//! Configuration validator for memory-injection
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{AttachConfig, Config, ConfigError, LoggingConfig, ProcessConfig, ServiceConfig};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_process(&config.process)?;
        Self::validate_service(&config.service)?;
        Self::validate_attach(&config.service.attach)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    fn validate_process(process: &ProcessConfig) -> Result<(), ConfigError> {
        if process.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Process name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_service(service: &ServiceConfig) -> Result<(), ConfigError> {
        if service.watch_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "Watch interval must be greater than 0".to_string(),
            ));
        }

        if service.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "Tick interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_attach(attach: &AttachConfig) -> Result<(), ConfigError> {
        if attach.initial_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "Attach delay must be greater than 0".to_string(),
            ));
        }

        if attach.max_delay_ms < attach.initial_delay_ms {
            return Err(ConfigError::Invalid(
                "Maximum attach delay must be at least the initial delay".to_string(),
            ));
        }

        if !attach.multiplier.is_finite() || attach.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "Attach multiplier must be at least 1.0, got {}",
                attach.multiplier
            )));
        }

        if attach.report_every == 0 {
            return Err(ConfigError::Invalid(
                "Attach report interval must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}
