mod app;
mod cli;
mod screens;
mod stream;

use anyhow::{bail, Result};
use clap::Parser;
use std::path::Path;

use app::App;
use cli::{Cli, Commands, ConfigCommands};
use pulsemon::utils::logging::{self, LogTarget};
use pulsemon::utils::AppConfig;
use stream::StreamOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => AppConfig::config_path()?,
    };

    match cli.command {
        None => {
            // No command - run interactive TUI
            run_dashboard(&config_path, cli.verbose, None).await?;
        }
        Some(Commands::Top { process }) => {
            run_dashboard(&config_path, cli.verbose, process).await?;
        }
        Some(Commands::Stream {
            source,
            target,
            interval,
            format,
            count,
        }) => {
            logging::init(&LogTarget::Stderr, cli.verbose)?;
            let config = AppConfig::load_from(&config_path)?;
            let options = StreamOptions {
                source,
                target,
                interval,
                format,
                count,
            };
            stream::run(&config, options).await?;
        }
        Some(Commands::Config { command }) => {
            handle_config(command, &config_path)?;
        }
    }

    Ok(())
}

async fn run_dashboard(config_path: &Path, verbose: bool, process: Option<String>) -> Result<()> {
    let log_target = match config_path.parent() {
        Some(dir) => LogTarget::File(dir.join("pulsemon.log")),
        None => LogTarget::default_file()?,
    };
    logging::init(&log_target, verbose)?;

    let config = AppConfig::load_from(config_path)?;
    let mut app = App::new(config, process.as_deref())?;
    app.run().await
}

fn handle_config(command: ConfigCommands, path: &Path) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = AppConfig::load_from(path)?;
            println!("# {}", describe(path));
            print!("{}", config.to_toml()?);
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config file {} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            AppConfig::default().save_to(path)?;
            println!("✓ Wrote default configuration to {}", path.display());
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn describe(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, showing defaults)", path.display())
    }
}
