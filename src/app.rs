/// Main TUI application

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use pulsemon::core::{CpuCoresViewModel, MemoryViewModel, MonitorStatus, Poller, ProcessViewModel};
use pulsemon::utils::logging;
use pulsemon::utils::AppConfig;

use crate::screens::{Dashboard, ViewState};

// How long a status line stays in the footer
const STATUS_TTL: Duration = Duration::from_secs(3);

const MIN_CPU_INTERVAL: Duration = Duration::from_millis(50);
const MAX_CPU_INTERVAL: Duration = Duration::from_secs(5);

pub struct App {
    cpu: CpuCoresViewModel,
    memory: MemoryViewModel,
    process: Option<ProcessViewModel>,
    dashboard: Rc<RefCell<Dashboard>>,
    poller: Poller,
    status_message: Option<(String, Instant)>,
    show_help: bool,
    paused: bool,
    should_quit: bool,
}

impl App {
    pub fn new(config: AppConfig, process: Option<&str>) -> Result<Self> {
        let policy = config.channel.policy();
        let dashboard = Rc::new(RefCell::new(Dashboard::new(format!(
            "pulsemon v{}",
            env!("CARGO_PKG_VERSION")
        ))));

        let mut cpu = CpuCoresViewModel::cpu_cores(&config.cpu, policy);
        let dash = Rc::clone(&dashboard);
        cpu.subscribe("dashboard", move |frame| {
            dash.borrow_mut().update_cpu(frame);
            Ok(())
        });

        let mut memory = MemoryViewModel::memory(&config.memory, policy);
        let dash = Rc::clone(&dashboard);
        memory.subscribe("dashboard", move |frame| {
            dash.borrow_mut().update_memory(frame);
            Ok(())
        });

        let process = match process {
            Some(identifier) => {
                let mut vm = ProcessViewModel::process(identifier, &config.process, policy)
                    .with_context(|| format!("Cannot monitor process '{}'", identifier))?;
                let dash = Rc::clone(&dashboard);
                vm.subscribe("dashboard", move |frame| {
                    dash.borrow_mut().update_process(frame);
                    Ok(())
                });
                let dash = Rc::clone(&dashboard);
                vm.on_started(move |_| dash.borrow_mut().clear_process_status());
                let dash = Rc::clone(&dashboard);
                vm.on_finished(move |status| dash.borrow_mut().set_process_status(status));
                Some(vm)
            }
            None => None,
        };

        Ok(Self {
            cpu,
            memory,
            process,
            dashboard,
            poller: Poller::new(config.ui.poll_cadence),
            status_message: None,
            show_help: false,
            paused: false,
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.start_monitors()?;
        let _panic_guard = logging::route_panics_to_log();

        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        self.stop_monitors().await;
        result
    }

    fn start_monitors(&mut self) -> Result<()> {
        self.cpu.start()?;
        self.memory.start()?;
        if let Some(process) = self.process.as_mut() {
            // A process that already exited stays on screen with its last status
            if let Err(err) = process.start() {
                self.dashboard.borrow_mut().set_process_status(&MonitorStatus {
                    success: false,
                    message: err.to_string(),
                });
            }
        }
        info!("Monitors started");
        Ok(())
    }

    async fn stop_monitors(&mut self) {
        self.cpu.stop().await;
        self.memory.stop().await;
        if let Some(process) = self.process.as_mut() {
            process.stop().await;
        }
        info!("Monitors stopped");
    }

    fn poll_monitors(&mut self) {
        self.poller.cycle(&mut self.cpu, |_| Ok(()));
        self.poller.cycle(&mut self.memory, |_| Ok(()));
        if let Some(process) = self.process.as_mut() {
            self.poller.cycle(process, |_| Ok(()));
        }

        let mut errors = self.cpu.take_render_errors();
        errors.extend(self.memory.take_render_errors());
        if let Some(process) = self.process.as_mut() {
            errors.extend(process.take_render_errors());
        }
        for err in errors {
            debug!(error = %err, "Dashboard update failed");
        }
    }

    fn set_status(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    async fn run_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<()> {
        loop {
            if self.poller.is_due(tokio::time::Instant::now()) {
                self.poll_monitors();
            }

            if let Some((_, since)) = &self.status_message {
                if since.elapsed() >= STATUS_TTL {
                    self.status_message = None;
                }
            }

            let dropped = self.cpu.dropped() + self.memory.dropped();
            let cpu_interval_ms = self.cpu.period().as_millis();
            let view = ViewState {
                status_message: self.status_message.as_ref().map(|(m, _)| m.as_str()),
                show_help: self.show_help,
                paused: self.paused,
                cpu_interval_ms,
                dropped,
            };
            let dashboard = self.dashboard.borrow();
            terminal.draw(|f| dashboard.render(f, &view))?;
            drop(dashboard);

            let timeout = self.poller.time_until_due(tokio::time::Instant::now());
            if event::poll(timeout)? {
                if let Event::Key(key_event) = event::read()? {
                    if key_event.kind == KeyEventKind::Press {
                        self.handle_key(key_event.code).await?;
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    async fn handle_key(&mut self, key: KeyCode) -> Result<()> {
        if self.show_help {
            if matches!(key, KeyCode::Char('?') | KeyCode::F(1) | KeyCode::Esc) {
                self.show_help = false;
            }
            return Ok(());
        }

        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('?') | KeyCode::F(1) => self.show_help = true,
            KeyCode::Char('p') => {
                if self.paused {
                    self.start_monitors()?;
                    self.paused = false;
                    self.set_status("Sampling resumed".to_string());
                } else {
                    self.stop_monitors().await;
                    self.paused = true;
                    self.set_status("Sampling paused".to_string());
                }
            }
            KeyCode::Char('+') => self.change_cpu_interval(true)?,
            KeyCode::Char('-') => self.change_cpu_interval(false)?,
            _ => {}
        }

        Ok(())
    }

    /// Double or halve the CPU period; the running monitor keeps its history
    fn change_cpu_interval(&mut self, slower: bool) -> Result<()> {
        let current = self.cpu.period();
        let next = (if slower { current * 2 } else { current / 2 })
            .clamp(MIN_CPU_INTERVAL, MAX_CPU_INTERVAL);
        if next == current {
            return Ok(());
        }

        self.cpu.set_period(next)?;
        self.set_status(format!(
            "CPU sampling every {}",
            humantime::format_duration(next)
        ));
        Ok(())
    }
}
