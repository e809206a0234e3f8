//! Beacon CLI - main entry point

use std::time::Duration;

use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info};

use beacon_cli::{
    app::{Backend, BeaconApp},
    cli::{Cli, Commands},
    config::AppConfig,
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    if let Commands::ExampleConfig = cli.command {
        println!("{}", AppConfig::example_config());
        return Ok(());
    }

    // Load configuration
    let config = load_configuration(&cli)?;
    let backend = select_backend(&cli, &config);

    let app = BeaconApp::start(&config, backend).await?;

    // Execute the command
    let outcome = match &cli.command {
        Commands::Serve => {
            info!("Serving method calls on stdin");
            app.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await
        }
        Commands::Advertise { uuid, duration } => {
            app.advertise(uuid, duration.map(Duration::from_secs)).await
        }
        Commands::ExampleConfig => Ok(()),
    };

    app.shutdown().await;

    if let Err(e) = outcome {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("beacon exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level
///
/// Logs go to stderr; stdout carries responses in serve mode.
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
        Ok(AppConfig::load_from_file(config_path)?)
    } else {
        info!("Using default configuration");
        Ok(AppConfig::load_default()?)
    }
}

/// Command line flags take precedence over the config file
fn select_backend(cli: &Cli, config: &AppConfig) -> Backend {
    if !(cli.simulated || config.cli.simulated) {
        return Backend::Platform;
    }

    Backend::Simulated {
        gate: cli.gate.unwrap_or(config.cli.simulated_gate).into(),
        radio: cli.radio.into(),
        radio_on_after: cli.radio_on_after.map(Duration::from_secs),
    }
}
