//! Beacon CLI configuration
//!
//! Loaded from a TOML file given with `--config`, else from
//! `~/.beacon/config.toml` when it exists, else defaults. Missing keys take
//! their default values.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use beacon_ble::{AdvertiserConfig, ReadinessGate};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the beacon CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Advertising controller and platform backend settings
    pub advertiser: AdvertiserConfig,

    /// CLI-specific settings
    pub cli: CliConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Use the simulated radio instead of the platform adapter
    pub simulated: bool,

    /// Readiness model the simulated radio follows
    pub simulated_gate: SimulatedGate,
}

/// Readiness model for the simulated backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedGate {
    /// Start as soon as the radio is on (BlueZ-like)
    #[default]
    Immediate,
    /// Start only after a powered-on callback (Core Bluetooth-like)
    AwaitPoweredOn,
}

impl From<SimulatedGate> for ReadinessGate {
    fn from(gate: SimulatedGate) -> Self {
        match gate {
            SimulatedGate::Immediate => ReadinessGate::Immediate,
            SimulatedGate::AwaitPoweredOn => ReadinessGate::AwaitPoweredOn,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileSystem(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: AppConfig = toml::from_str(&contents).map_err(|e| {
            ConfigError::Loading(format!("Failed to load from {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load `~/.beacon/config.toml` if present, defaults otherwise
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".beacon").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.advertiser
            .validate()
            .map_err(|e| ConfigError::Validation(format!("advertiser: {}", e)))
    }

    /// Create example configuration file content
    pub fn example_config() -> String {
        let example_config = AppConfig {
            advertiser: AdvertiserConfig::new()
                .with_adapter_name("hci0")
                .with_power_on_adapter(false),
            cli: CliConfig {
                simulated: false,
                simulated_gate: SimulatedGate::Immediate,
            },
        };

        toml::to_string_pretty(&example_config)
            .unwrap_or_else(|_| "# Failed to generate example config".to_string())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    FileSystem(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("beacon-{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_default_config_creation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.cli.simulated);
        assert_eq!(config.cli.simulated_gate, SimulatedGate::Immediate);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = write_temp(
            "partial",
            r#"
[advertiser]
adapter_name = "hci1"
mailbox_capacity = 8

[cli]
simulated = true
simulated_gate = "await_powered_on"
"#,
        );
        let config = AppConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.advertiser.adapter_name.as_deref(), Some("hci1"));
        assert_eq!(config.advertiser.mailbox_capacity, 8);
        assert_eq!(
            config.advertiser.event_capacity,
            AdvertiserConfig::default().event_capacity
        );
        assert!(config.cli.simulated);
        assert_eq!(
            ReadinessGate::from(config.cli.simulated_gate),
            ReadinessGate::AwaitPoweredOn
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let path = write_temp("invalid", "[advertiser]\nmailbox_capacity = 0\n");
        let result = AppConfig::load_from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let path = write_temp("garbled", "[advertiser\n");
        let result = AppConfig::load_from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Loading(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::load_from_file("/nonexistent/beacon/config.toml");
        assert!(matches!(result, Err(ConfigError::FileSystem(_))));
    }

    #[test]
    fn test_example_config_generation() {
        let example = AppConfig::example_config();
        assert!(example.contains("[advertiser]"));
        assert!(example.contains("[cli]"));
        assert!(example.contains("hci0"));

        let parsed: AppConfig = toml::from_str(&example).unwrap();
        assert!(parsed.validate().is_ok());
    }
}
