//! Default configuration values for memory-injection

use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub process: ProcessDefaults,
    pub service: ServiceDefaults,
    pub offsets: OffsetsDefaults,
    pub logging: LoggingDefaults,
}

/// Default target process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefaults {
    pub name: String,
}

/// Default loop cadence and attach backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefaults {
    pub watch_interval_ms: u64,
    pub tick_interval_ms: u64,
    pub attach_initial_delay_ms: u64,
    pub attach_max_delay_ms: u64,
    pub attach_multiplier: f64,
    pub attach_report_every: u32,
}

/// Default offset file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetsDefaults {
    pub local: String,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        process: ProcessDefaults {
            name: "ffxiv_dx11".to_string(),
        },
        service: ServiceDefaults {
            watch_interval_ms: 100,
            tick_interval_ms: 16, // about one frame
            attach_initial_delay_ms: 250,
            attach_max_delay_ms: 5000,
            attach_multiplier: 2.0,
            attach_report_every: 10,
        },
        offsets: OffsetsDefaults {
            local: "offsets.json".to_string(),
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
        },
    }
}
