//! Worker loop: periodic sampler driven on its own tokio task
//!
//! The owner publishes [`RunState`] through a `watch` channel; the task reads
//! it at every tick boundary. Stopping is cooperative: at most one tick that
//! was already in progress completes after a stop request, and nothing is
//! pushed once [`WorkerLoop::stop`] has returned.
//!
//! Sampler calls block on OS counters, so each one runs on tokio's blocking
//! pool rather than on a runtime worker thread.

use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::{MonitorError, PushOutcome, SampleError, Sampler, Snapshot, SnapshotSender};

/// Lifecycle of a worker loop.
///
/// `Stopped` is the idle state and is reusable: a stopped loop can be started
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    StopRequested,
}

/// Why a worker task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The owner asked it to stop
    Stopped,
    /// The sampler reported its source disappeared
    SourceGone(String),
    /// The task panicked or was aborted
    Crashed(String),
}

/// Out-of-band sink for sampler failures; runs on the worker task
pub type ErrorCallback = Arc<dyn Fn(&SampleError) + Send + Sync>;

/// Default error sink: log and carry on
pub fn log_sample_error(name: &str) -> ErrorCallback {
    let name = name.to_string();
    Arc::new(move |err: &SampleError| {
        warn!(monitor = %name, error = %err, "Sample failed, skipping tick");
    })
}

pub struct WorkerLoop {
    name: String,
    state: watch::Sender<RunState>,
    period: watch::Sender<Duration>,
    handle: Option<JoinHandle<WorkerExit>>,
    on_error: ErrorCallback,
}

impl WorkerLoop {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (state, _) = watch::channel(RunState::Stopped);
        let (period, _) = watch::channel(Duration::ZERO);
        Self {
            on_error: log_sample_error(&name),
            name,
            state,
            period,
            handle: None,
        }
    }

    /// Replace the sampler error sink; applies from the next `start`
    pub fn set_error_callback(&mut self, on_error: ErrorCallback) {
        self.on_error = on_error;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Spawn the sampling task. Must be called inside a tokio runtime.
    ///
    /// Strict: returns [`MonitorError::AlreadyRunning`] if a task is live.
    pub fn start(
        &mut self,
        period: Duration,
        sampler: Box<dyn Sampler>,
        sender: SnapshotSender,
    ) -> Result<(), MonitorError> {
        if self.handle.is_some() || self.state() != RunState::Stopped {
            return Err(MonitorError::AlreadyRunning(self.name.clone()));
        }
        if period.is_zero() {
            return Err(MonitorError::ZeroPeriod(self.name.clone()));
        }

        self.state.send_replace(RunState::Running);
        self.period.send_replace(period);
        let state_rx = self.state.subscribe();
        let period_rx = self.period.subscribe();
        let on_error = Arc::clone(&self.on_error);
        let name = self.name.clone();

        info!(monitor = %name, period_ms = period.as_millis() as u64, "Starting worker");
        self.handle = Some(tokio::spawn(run_loop(
            name, sampler, sender, state_rx, period_rx, on_error,
        )));
        Ok(())
    }

    /// Retime a live task. The next tick lands one new period from now.
    pub fn set_period(&self, period: Duration) -> Result<(), MonitorError> {
        if period.is_zero() {
            return Err(MonitorError::ZeroPeriod(self.name.clone()));
        }
        if self.handle.is_none() {
            return Err(MonitorError::NotRunning(self.name.clone()));
        }
        self.period.send_replace(period);
        Ok(())
    }

    /// Signal the task to exit without waiting for it.
    ///
    /// Strict: returns [`MonitorError::NotRunning`] when there is nothing to stop.
    pub fn request_stop(&self) -> Result<(), MonitorError> {
        if self.handle.is_none() || self.state() != RunState::Running {
            return Err(MonitorError::NotRunning(self.name.clone()));
        }
        self.state.send_replace(RunState::StopRequested);
        Ok(())
    }

    /// Stop and join the task. A no-op when already stopped.
    pub async fn stop(&mut self) -> Option<WorkerExit> {
        let handle = self.handle.take()?;
        if self.state() == RunState::Running {
            self.state.send_replace(RunState::StopRequested);
        }

        let exit = match handle.await {
            Ok(exit) => exit,
            Err(err) => {
                warn!(monitor = %self.name, error = %err, "Worker task did not exit cleanly");
                WorkerExit::Crashed(err.to_string())
            }
        };

        self.state.send_replace(RunState::Stopped);
        info!(monitor = %self.name, ?exit, "Worker stopped");
        Some(exit)
    }

    /// Collect a task that ended on its own, without blocking
    pub fn reap(&mut self) -> Option<WorkerExit> {
        let finished = self.handle.as_ref().map_or(false, |h| h.is_finished());
        if !finished {
            return None;
        }

        let mut handle = self.handle.take()?;
        let exit = match (&mut handle).now_or_never() {
            Some(Ok(exit)) => exit,
            Some(Err(err)) => WorkerExit::Crashed(err.to_string()),
            None => {
                // is_finished raced with the output becoming available
                self.handle = Some(handle);
                return None;
            }
        };

        self.state.send_replace(RunState::Stopped);
        debug!(monitor = %self.name, ?exit, "Reaped finished worker");
        Some(exit)
    }

    /// Whether a task is spawned and not yet collected
    pub fn has_task(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether a spawned task is still executing
    pub fn is_live(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for WorkerLoop {
    fn drop(&mut self) {
        // Cannot join from drop: signal, then make sure the task is gone
        if let Some(handle) = self.handle.take() {
            self.state.send_replace(RunState::StopRequested);
            handle.abort();
        }
    }
}

enum Wake {
    Exit,
    Retime(Duration),
    Tick,
}

fn ticker_for(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run_loop(
    name: String,
    mut sampler: Box<dyn Sampler>,
    sender: SnapshotSender,
    mut state_rx: watch::Receiver<RunState>,
    mut period_rx: watch::Receiver<Duration>,
    on_error: ErrorCallback,
) -> WorkerExit {
    let mut ticker = ticker_for(*period_rx.borrow());

    loop {
        let wake = tokio::select! {
            biased;

            changed = state_rx.changed() => {
                if changed.is_err() || *state_rx.borrow() != RunState::Running {
                    Wake::Exit
                } else {
                    continue;
                }
            }

            changed = period_rx.changed() => match changed {
                Ok(()) => Wake::Retime(*period_rx.borrow_and_update()),
                Err(_) => Wake::Exit,
            },

            _ = ticker.tick() => Wake::Tick,
        };

        match wake {
            Wake::Exit => return WorkerExit::Stopped,
            Wake::Retime(period) => {
                debug!(monitor = %name, period_ms = period.as_millis() as u64, "Retiming worker");
                sampler.set_period(period);
                ticker = ticker_for(period);
            }
            Wake::Tick => {
                if *state_rx.borrow() != RunState::Running {
                    return WorkerExit::Stopped;
                }

                let (returned, outcome) = match sample_blocking(sampler).await {
                    Ok(done) => done,
                    Err(message) => return WorkerExit::Crashed(message),
                };
                sampler = returned;

                match outcome {
                    Ok(snapshot) => {
                        if sender.push(snapshot) == PushOutcome::DroppedOldest {
                            debug!(monitor = %name, "Channel full, dropped oldest snapshot");
                        }
                    }
                    Err(err) => {
                        on_error(&err);
                        if err.is_terminal() {
                            return WorkerExit::SourceGone(err.to_string());
                        }
                    }
                }
            }
        }
    }
}

type Sampled = (Box<dyn Sampler>, Result<Snapshot, SampleError>);

/// One sampler call on the blocking pool; hands the sampler back afterwards
async fn sample_blocking(mut sampler: Box<dyn Sampler>) -> Result<Sampled, String> {
    tokio::task::spawn_blocking(move || {
        let outcome = sampler.sample();
        (sampler, outcome)
    })
    .await
    .map_err(|err| format!("sampler task failed: {}", err))
}
