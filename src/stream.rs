/// Headless consumer: prints one line per frame to stdout

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use pulsemon::core::{
    CpuFrame, CpuCoresViewModel, MemoryFrame, MemoryViewModel, MonitorViewModel,
    Poller, Presenter, ProcessFrame, ProcessViewModel, Usage,
};
use pulsemon::utils::{format_bytes, format_percent, meter_bar, AppConfig, Rgb};

use crate::cli::{OutputFormat, StreamSource};

const METER_WIDTH: usize = 20;

/// Plain-text rendering of a frame
pub trait TextLine {
    fn text_line(&self) -> String;
}

fn paint(text: String, color: Rgb) -> String {
    text.truecolor(color.0, color.1, color.2).to_string()
}

fn usage_text(label: &str, usage: &Usage) -> String {
    format!(
        "{} {} {} / {}",
        label,
        format_percent(usage.percent),
        format_bytes(usage.used),
        format_bytes(usage.total)
    )
}

impl TextLine for CpuFrame {
    fn text_line(&self) -> String {
        let cores: Vec<String> = self.cores.iter().map(|c| format!("{:.0}", c)).collect();
        format!(
            "{} cpu {} {} cores [{}]",
            self.taken_at.format("%H:%M:%S%.3f"),
            paint(format_percent(self.global), self.color),
            meter_bar(self.global, METER_WIDTH),
            cores.join(" ")
        )
    }
}

impl TextLine for MemoryFrame {
    fn text_line(&self) -> String {
        let swap = match &self.swap {
            Some(swap) => usage_text("swap", swap),
            None => "swap n/a".to_string(),
        };
        format!(
            "{} {} | {}",
            self.taken_at.format("%H:%M:%S%.3f"),
            paint(usage_text("ram", &self.ram), self.ram_color),
            swap
        )
    }
}

impl TextLine for ProcessFrame {
    fn text_line(&self) -> String {
        format!(
            "{} {} ({}) {} {}",
            self.taken_at.format("%H:%M:%S%.3f"),
            self.name,
            self.pid,
            paint(format_percent(self.cpu_percent), self.color),
            meter_bar(self.cpu_percent, METER_WIDTH)
        )
    }
}

pub fn render_frame<F>(frame: &F, format: OutputFormat) -> Result<String>
where
    F: TextLine + Serialize,
{
    match format {
        OutputFormat::Text => Ok(frame.text_line()),
        OutputFormat::Json => serde_json::to_string(frame).context("Failed to encode frame"),
    }
}

pub struct StreamOptions {
    pub source: StreamSource,
    pub target: Option<String>,
    pub interval: Option<std::time::Duration>,
    pub format: OutputFormat,
    pub count: Option<usize>,
}

pub async fn run(config: &AppConfig, options: StreamOptions) -> Result<()> {
    let policy = config.channel.policy();

    match options.source {
        StreamSource::Cpu => {
            let mut settings = config.cpu.clone();
            if let Some(interval) = options.interval {
                settings.interval = interval;
            }
            let vm = CpuCoresViewModel::cpu_cores(&settings, policy);
            drive(vm, config, &options).await
        }
        StreamSource::Memory => {
            let mut settings = config.memory.clone();
            if let Some(interval) = options.interval {
                settings.interval = interval;
            }
            let vm = MemoryViewModel::memory(&settings, policy);
            drive(vm, config, &options).await
        }
        StreamSource::Process => {
            let target = options
                .target
                .as_deref()
                .context("--target is required for the process source")?;
            let mut settings = config.process.clone();
            if let Some(interval) = options.interval {
                settings.interval = interval;
            }
            let vm = ProcessViewModel::process(target, &settings, policy)?;
            drive(vm, config, &options).await
        }
    }
}

async fn drive<P>(
    mut vm: MonitorViewModel<P>,
    config: &AppConfig,
    options: &StreamOptions,
) -> Result<()>
where
    P: Presenter + 'static,
    P::Frame: TextLine + Serialize,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let printed = Rc::new(Cell::new(0usize));
    let limit = options.count;
    let format = options.format;

    {
        let printed = Rc::clone(&printed);
        vm.subscribe("stdout", move |frame: &P::Frame| {
            if limit.map_or(false, |n| printed.get() >= n) {
                return Ok(());
            }
            let line = render_frame(frame, format)?;
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", line).context("Failed to write to stdout")?;
            printed.set(printed.get() + 1);
            Ok(())
        });
    }

    {
        let shutdown_tx = Arc::clone(&shutdown_tx);
        vm.on_finished(move |status| {
            // Only report monitors that ended before we asked them to
            if !*shutdown_tx.borrow() {
                if status.success {
                    eprintln!("{}", status.message);
                } else {
                    eprintln!("{}", status.message.yellow());
                }
            }
            shutdown_tx.send_replace(true);
        });
    }

    let ctrl_c = {
        let shutdown_tx = Arc::clone(&shutdown_tx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown_tx.send_replace(true);
            }
        })
    };

    vm.start()?;
    info!(monitor = %vm.name(), "Streaming");

    let mut poller = Poller::new(config.ui.poll_cadence);
    let limit_tx = Arc::clone(&shutdown_tx);
    poller
        .run(
            &mut vm,
            |_| {
                if limit.map_or(false, |n| printed.get() >= n) {
                    limit_tx.send_replace(true);
                }
                Ok(())
            },
            shutdown_rx,
        )
        .await;

    ctrl_c.abort();
    vm.stop().await;

    if poller.failures() > 0 || !vm.take_render_errors().is_empty() {
        info!(failures = poller.failures(), "Some frames failed to render");
    }
    Ok(())
}
