//! Configuration module for memory-injection
//!
//! Provides configuration loading, validation, and default settings
//! for the injection service.

mod defaults;
mod loader;
mod validator;

pub use defaults::{default_config, ConfigDefaults};
pub use loader::{load_config, ConfigLoader};
pub use validator::{validate_config, ConfigValidator};

// Re-export the configuration structures
pub use loader::{
    AttachConfig, Config, LoggingConfig, MatchMode, OffsetsConfig, ProcessConfig, ServiceConfig,
};

// Configuration-related error type
pub use loader::ConfigError;

// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;
