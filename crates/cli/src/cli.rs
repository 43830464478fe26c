//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fusion Bridge - forwards fused radio events from MQTT to the transcription and command services
#[derive(Parser, Debug)]
#[command(
    name = "fusion-bridge",
    author,
    version,
    about = "MQTT to REST bridge for fused radio events",
    long_about = "Subscribes to the fusion result and control topics of an MQTT broker and\n\
                  forwards every fused event to the radio transcription service and to the\n\
                  mission command service."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FUSION_BRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FUSION_BRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge until `exit` is received on the control topic
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML, JSON or YAML)
    #[arg(
        short,
        long,
        default_value = "bridge.toml",
        env = "FUSION_BRIDGE_CONFIG"
    )]
    pub config: PathBuf,

    /// Override MQTT broker host from configuration
    #[arg(long, env = "FUSION_BRIDGE_BROKER_HOST")]
    pub host: Option<String>,

    /// Override MQTT broker port from configuration
    #[arg(long, env = "FUSION_BRIDGE_BROKER_PORT")]
    pub port: Option<u16>,

    /// Stop after this many seconds (0 = run until exit command or signal)
    #[arg(long, default_value = "0", env = "FUSION_BRIDGE_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "FUSION_BRIDGE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "bridge.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "bridge.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Query the command service health and resolve the mission
    #[arg(long)]
    pub probe: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_defaults() {
        let cli = Cli::try_parse_from(["fusion-bridge", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("bridge.toml"));
        assert_eq!(args.timeout, 0);
        assert_eq!(args.metrics_port, 9000);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["fusion-bridge", "-q", "-v", "validate"]).is_err());
    }

    #[test]
    fn test_info_probe_flag() {
        let cli = Cli::try_parse_from(["fusion-bridge", "info", "--config", "x.yaml", "--probe"])
            .unwrap();
        let Commands::Info(args) = cli.command else {
            panic!("expected info");
        };
        assert!(args.probe);
        assert_eq!(args.config, PathBuf::from("x.yaml"));
    }
}
