//! Beacon CLI library
//!
//! This library provides the host application around `beacon-ble`: argument
//! parsing, configuration loading, and the JSON line command server.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::{Backend, BeaconApp};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
