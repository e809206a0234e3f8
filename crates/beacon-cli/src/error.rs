//! Error handling for the beacon CLI

use thiserror::Error;

use beacon_ble::{StartError, StopError};

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Advertising start failed: {0}")]
    Start(#[from] StartError),

    #[error("Advertising stop failed: {0}")]
    Stop(#[from] StopError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Runtime(format!("{:#}", err))
    }
}
