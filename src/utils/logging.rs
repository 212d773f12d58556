/// Tracing setup for the binary
///
/// The dashboard owns the terminal, so it logs to a file; the headless
/// stream command logs to stderr.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::utils::constants::{APP_NAME, LOG_ENV};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// `~/.config/pulsemon/pulsemon.log`
    pub fn default_file() -> Result<Self> {
        let dir = dirs::config_dir()
            .context("Could not determine the user config directory")?
            .join(APP_NAME);
        Ok(LogTarget::File(dir.join(format!("{}.log", APP_NAME))))
    }
}

/// `-v` forces debug; otherwise PULSEMON_LOG, falling back to info
pub fn build_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Call once, before any monitor starts.
pub fn init(target: &LogTarget, verbose: bool) -> Result<()> {
    let filter = build_filter(verbose);

    match target {
        LogTarget::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to install logger")?,
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
                .context("Failed to install logger")?
        }
    }

    Ok(())
}

/// Sends panic reports to the log instead of stderr while alive.
///
/// Callback panics are caught by the monitors, but the default hook still
/// prints them, which would scribble over a full-screen UI. Dropping the
/// guard restores the default hook.
pub struct PanicLogGuard {
    _private: (),
}

pub fn route_panics_to_log() -> PanicLogGuard {
    panic::set_hook(Box::new(|info| {
        error!(panic = %info, "Panic caught");
    }));
    PanicLogGuard { _private: () }
}

impl Drop for PanicLogGuard {
    fn drop(&mut self) {
        let _ = panic::take_hook();
    }
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("Failed to create log directory")?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
