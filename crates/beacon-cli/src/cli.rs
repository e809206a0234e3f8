//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand, ValueEnum};

use beacon_ble::RadioState;

use crate::config::SimulatedGate;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use a simulated radio instead of the platform adapter
    #[arg(long)]
    pub simulated: bool,

    /// Readiness model of the simulated radio
    #[arg(long, value_enum)]
    pub gate: Option<SimulatedGate>,

    /// Initial state of the simulated radio
    #[arg(long, value_enum, default_value = "powered-on")]
    pub radio: RadioArg,

    /// Power the simulated radio on after this many seconds
    #[arg(long)]
    pub radio_on_after: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer JSON method calls read line by line from stdin
    Serve,
    /// Advertise one service UUID until interrupted
    Advertise {
        /// Service UUID (8-4-4-4-12 hex)
        #[arg(short, long)]
        uuid: String,
        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Print an example configuration file
    ExampleConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RadioArg {
    Unknown,
    Unavailable,
    PoweredOn,
    PoweredOff,
}

impl From<RadioArg> for RadioState {
    fn from(arg: RadioArg) -> Self {
        match arg {
            RadioArg::Unknown => RadioState::Unknown,
            RadioArg::Unavailable => RadioState::Unavailable,
            RadioArg::PoweredOn => RadioState::PoweredOn,
            RadioArg::PoweredOff => RadioState::PoweredOff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_advertise() {
        let cli = Cli::try_parse_from([
            "beacon",
            "--simulated",
            "--radio",
            "powered-off",
            "--radio-on-after",
            "2",
            "advertise",
            "--uuid",
            "12345678-1234-1234-1234-123456789abc",
            "--duration",
            "10",
        ])
        .unwrap();

        assert!(cli.simulated);
        assert_eq!(cli.radio, RadioArg::PoweredOff);
        assert_eq!(cli.radio_on_after, Some(2));
        match cli.command {
            Commands::Advertise { uuid, duration } => {
                assert_eq!(uuid, "12345678-1234-1234-1234-123456789abc");
                assert_eq!(duration, Some(10));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["beacon", "serve"]).unwrap();
        assert!(!cli.simulated);
        assert!(cli.gate.is_none());
        assert_eq!(RadioState::from(cli.radio), RadioState::PoweredOn);
        assert!(matches!(cli.command, Commands::Serve));
    }

    #[test]
    fn test_parse_gate() {
        let cli =
            Cli::try_parse_from(["beacon", "--gate", "await-powered-on", "serve"]).unwrap();
        assert_eq!(cli.gate, Some(SimulatedGate::AwaitPoweredOn));
    }

    #[test]
    fn test_advertise_requires_uuid() {
        assert!(Cli::try_parse_from(["beacon", "advertise"]).is_err());
    }
}
