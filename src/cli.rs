/// CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built: ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser)]
#[command(name = "pulsemon")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/pulsemon/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging (overrides PULSEMON_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Live dashboard (the default when no command is given)
    Top {
        /// Also chart one process, by PID or exact name
        #[arg(short, long)]
        process: Option<String>,
    },

    /// Print frames to stdout without a UI
    Stream {
        /// Metrics source
        #[arg(short, long, value_enum, default_value = "cpu")]
        source: StreamSource,

        /// PID or exact process name (required for --source process)
        #[arg(short, long)]
        target: Option<String>,

        /// Sampling period, e.g. 200ms or 1s (default from config)
        #[arg(short, long, value_parser = parse_period)]
        interval: Option<Duration>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Exit after this many frames
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Human duration above zero, e.g. 200ms or 1s
fn parse_period(raw: &str) -> Result<Duration, String> {
    let period = humantime::parse_duration(raw).map_err(|e| e.to_string())?;
    if period.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(period)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StreamSource {
    Cpu,
    Memory,
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the config file location
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_command_means_dashboard() {
        let cli = Cli::parse_from(["pulsemon"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_stream_arguments() {
        let cli = Cli::parse_from([
            "pulsemon", "stream", "--source", "process", "--target", "firefox", "--interval",
            "250ms", "--format", "json", "-n", "10", "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Stream {
                source,
                target,
                interval,
                format,
                count,
            }) => {
                assert_eq!(source, StreamSource::Process);
                assert_eq!(target.as_deref(), Some("firefox"));
                assert_eq!(interval, Some(Duration::from_millis(250)));
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(count, Some(10));
            }
            _ => panic!("expected stream command"),
        }
    }

    #[test]
    fn test_bad_interval_is_rejected() {
        assert!(Cli::try_parse_from(["pulsemon", "stream", "--interval", "fast"]).is_err());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let err = Cli::try_parse_from(["pulsemon", "stream", "--interval", "0s"])
            .err()
            .unwrap();
        assert!(err.to_string().contains("greater than zero"));
        assert_eq!(parse_period("1s"), Ok(Duration::from_secs(1)));
    }
}
