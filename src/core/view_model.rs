//! Consumer-facing monitor: owns the worker, the channel and the history
//!
//! Everything here runs on the UI context. The host calls [`MonitorViewModel::poll`]
//! on its own cadence; subscribers receive one presented frame per snapshot.
//! Lifecycle calls on this type are idempotent, unlike [`WorkerLoop`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::presenter::{CpuCoresPresenter, MemoryPresenter, Presenter, ProcessPresenter};
use crate::core::system::{CpuCoresSampler, MemorySampler, ProcessCpuSampler, ProcessTarget};
use crate::core::worker::{ErrorCallback, RunState, WorkerExit, WorkerLoop};
use crate::core::{
    channel, ChannelPolicy, HistoryBuffer, MonitorError, Sampler, SamplerFactory, Snapshot,
    SnapshotReceiver,
};
use crate::utils::app_config::{CpuSettings, MonitorSettings};

// Oldest render failures are discarded past this many
const MAX_RENDER_ERRORS: usize = 64;

pub type FrameCallback<F> = Box<dyn FnMut(&F) -> anyhow::Result<()>>;
pub type FinishedHandler = Box<dyn FnMut(&MonitorStatus)>;
pub type StartedHandler = Box<dyn FnMut(&MonitorStarted)>;

/// Delivered to `on_started` handlers once a worker is spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorStarted {
    pub monitor: String,
    pub period: Duration,
}

/// Outcome delivered to `on_finished` handlers.
///
/// A watched source going away (the process exited) is a normal end and
/// reports `success: true`; only crashes report failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorStatus {
    pub success: bool,
    pub message: String,
}

/// Sampling parameters shared by every monitor kind
#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub period: Duration,
    pub policy: ChannelPolicy,
    pub history_length: usize,
}

pub struct MonitorViewModel<P: Presenter> {
    name: String,
    options: MonitorOptions,
    factory: SamplerFactory,
    presenter: P,
    worker: WorkerLoop,
    receiver: Option<SnapshotReceiver>,
    history: HistoryBuffer,
    latest: Option<P::Frame>,
    subscribers: Vec<(String, FrameCallback<P::Frame>)>,
    started_handlers: Vec<StartedHandler>,
    finished_handlers: Vec<FinishedHandler>,
    render_errors: Vec<MonitorError>,
}

pub type CpuCoresViewModel = MonitorViewModel<CpuCoresPresenter>;
pub type MemoryViewModel = MonitorViewModel<MemoryPresenter>;
pub type ProcessViewModel = MonitorViewModel<ProcessPresenter>;

impl<P: Presenter> MonitorViewModel<P> {
    pub fn new(
        name: impl Into<String>,
        options: MonitorOptions,
        factory: SamplerFactory,
        presenter: P,
    ) -> Self {
        let name = name.into();
        Self {
            worker: WorkerLoop::new(name.clone()),
            history: HistoryBuffer::new(options.history_length),
            name,
            options,
            factory,
            presenter,
            receiver: None,
            latest: None,
            subscribers: Vec::new(),
            started_handlers: Vec::new(),
            finished_handlers: Vec::new(),
            render_errors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Start sampling with a fresh sampler, channel and history.
    ///
    /// A no-op when already running. A worker that ended on its own is
    /// collected first, so this restarts it. Fails when the sampler cannot be
    /// built or the period is zero.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        // Leftovers of an ended run are discarded, as on stop()
        if let Some(exit) = self.worker.reap() {
            self.receiver = None;
            self.finish(exit);
        }

        if self.worker.has_task() {
            debug!(monitor = %self.name, "Start ignored, already running");
            return Ok(());
        }
        if self.options.period.is_zero() {
            return Err(MonitorError::ZeroPeriod(self.name.clone()));
        }

        let sampler: Box<dyn Sampler> = (self.factory)(self.options.period)?;
        let (sender, receiver) = channel(self.options.policy);

        self.history.clear();
        self.latest = None;
        self.worker.start(self.options.period, sampler, sender)?;
        self.receiver = Some(receiver);

        let started = MonitorStarted {
            monitor: self.name.clone(),
            period: self.options.period,
        };
        for handler in self.started_handlers.iter_mut() {
            handler(&started);
        }
        Ok(())
    }

    /// Stop and join the worker, then release the channel.
    ///
    /// Safe to call when never started. Snapshots not yet polled are discarded.
    pub async fn stop(&mut self) {
        let exit = self.worker.stop().await;
        self.receiver = None;
        if let Some(exit) = exit {
            self.finish(exit);
        }
    }

    /// Drain pending snapshots and dispatch a frame for each, in order.
    ///
    /// Returns the drained snapshots; empty when not running.
    pub fn poll(&mut self) -> Vec<Snapshot> {
        // Reap before draining so the final pushes of a worker that just ended are kept
        let exit = self.worker.reap();

        let batch = match self.receiver.as_ref() {
            Some(receiver) => receiver.try_pop_all(),
            None => Vec::new(),
        };

        for snapshot in &batch {
            self.history.push(snapshot.clone());
            let frame = self.presenter.present(snapshot, &self.history);
            self.dispatch(&frame);
            self.latest = Some(frame);
        }

        if let Some(exit) = exit {
            self.receiver = None;
            self.finish(exit);
        }

        batch
    }

    /// Register a frame callback. Failures and panics are isolated per callback.
    pub fn subscribe<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: FnMut(&P::Frame) -> anyhow::Result<()> + 'static,
    {
        self.subscribers.push((name.into(), Box::new(callback)));
    }

    /// Called each time a worker is spawned
    pub fn on_started<F>(&mut self, handler: F)
    where
        F: FnMut(&MonitorStarted) + 'static,
    {
        self.started_handlers.push(Box::new(handler));
    }

    /// Called when the worker ends, either on `stop()` or on its own
    pub fn on_finished<F>(&mut self, handler: F)
    where
        F: FnMut(&MonitorStatus) + 'static,
    {
        self.finished_handlers.push(Box::new(handler));
    }

    /// Sampler failures, delivered from the worker task. Applies from the next start.
    pub fn on_sample_error(&mut self, callback: ErrorCallback) {
        self.worker.set_error_callback(callback);
    }

    pub fn latest_frame(&self) -> Option<&P::Frame> {
        self.latest.as_ref()
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn series(&self, unit: usize) -> Vec<f64> {
        self.history.series(unit)
    }

    pub fn padded_series(&self, unit: usize) -> Vec<f64> {
        self.history.pad(self.history.series(unit))
    }

    pub fn run_state(&self) -> RunState {
        self.worker.state()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_live() && self.worker.state() == RunState::Running
    }

    pub fn take_render_errors(&mut self) -> Vec<MonitorError> {
        std::mem::take(&mut self.render_errors)
    }

    /// Snapshots discarded by the bounded channel since the last start
    pub fn dropped(&self) -> u64 {
        self.receiver.as_ref().map_or(0, |r| r.dropped())
    }

    pub fn period(&self) -> Duration {
        self.options.period
    }

    /// Change the sampling period. A running worker is retimed in place and
    /// the history is kept.
    pub fn set_period(&mut self, period: Duration) -> Result<(), MonitorError> {
        if period.is_zero() {
            return Err(MonitorError::ZeroPeriod(self.name.clone()));
        }
        self.options.period = period;
        if self.worker.has_task() {
            self.worker.set_period(period)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, frame: &P::Frame) {
        for (callback_name, callback) in self.subscribers.iter_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(frame)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{:#}", err),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };

            warn!(monitor = %self.name, callback = %callback_name, %message, "Render callback failed");
            if self.render_errors.len() == MAX_RENDER_ERRORS {
                self.render_errors.remove(0);
            }
            self.render_errors.push(MonitorError::RenderCallback {
                callback: callback_name.clone(),
                message,
            });
        }
    }

    fn finish(&mut self, exit: WorkerExit) {
        let status = match exit {
            WorkerExit::Stopped => MonitorStatus {
                success: true,
                message: format!("{} monitor stopped", self.name),
            },
            WorkerExit::SourceGone(message) => {
                info!(monitor = %self.name, %message, "Monitor finished on its own");
                MonitorStatus {
                    success: true,
                    message,
                }
            }
            WorkerExit::Crashed(message) => MonitorStatus {
                success: false,
                message: format!("{} monitor crashed: {}", self.name, message),
            },
        };

        for handler in self.finished_handlers.iter_mut() {
            handler(&status);
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl MonitorViewModel<CpuCoresPresenter> {
    pub fn cpu_cores(settings: &CpuSettings, policy: ChannelPolicy) -> Self {
        let smoothing = settings.smoothing;
        let factory: SamplerFactory = Box::new(move |period| {
            Ok(Box::new(CpuCoresSampler::new(period, smoothing)?) as Box<dyn Sampler>)
        });
        let options = MonitorOptions {
            period: settings.interval,
            policy,
            history_length: settings.history_length,
        };
        Self::new("cpu", options, factory, CpuCoresPresenter)
    }
}

impl MonitorViewModel<MemoryPresenter> {
    pub fn memory(settings: &MonitorSettings, policy: ChannelPolicy) -> Self {
        let factory: SamplerFactory =
            Box::new(|_| Ok(Box::new(MemorySampler::new()) as Box<dyn Sampler>));
        let options = MonitorOptions {
            period: settings.interval,
            policy,
            history_length: settings.history_length,
        };
        Self::new("memory", options, factory, MemoryPresenter)
    }
}

impl MonitorViewModel<ProcessPresenter> {
    /// Monitor one process given a PID or an unambiguous name
    pub fn process(
        identifier: &str,
        settings: &MonitorSettings,
        policy: ChannelPolicy,
    ) -> Result<Self, MonitorError> {
        let target = ProcessTarget::resolve(identifier)?;
        let pid = target.pid;
        let factory: SamplerFactory =
            Box::new(move |_| Ok(Box::new(ProcessCpuSampler::new(pid)?) as Box<dyn Sampler>));
        let options = MonitorOptions {
            period: settings.interval,
            policy,
            history_length: settings.history_length,
        };
        Ok(Self::new(
            format!("process {}", pid),
            options,
            factory,
            ProcessPresenter::new(target.pid, target.name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::presenter::RawPresenter;
    use crate::core::sampler::CountingSampler;
    use crate::core::SampleError;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tokio::time::sleep;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn counting_vm(policy: ChannelPolicy, failing: &'static [u64]) -> MonitorViewModel<RawPresenter> {
        let factory: SamplerFactory = Box::new(move |_| {
            Ok(Box::new(CountingSampler::new().failing_on(failing)) as Box<dyn Sampler>)
        });
        let options = MonitorOptions {
            period: ms(100),
            policy,
            history_length: 8,
        };
        let mut vm = MonitorViewModel::new("test", options, factory, RawPresenter);
        vm.on_sample_error(std::sync::Arc::new(|_: &SampleError| {}));
        vm
    }

    fn values(batch: &[Snapshot]) -> Vec<f64> {
        batch.iter().map(|s| s.readings()[0]).collect()
    }

    #[tokio::test]
    async fn test_poll_and_stop_before_start() {
        let mut vm = counting_vm(ChannelPolicy::Unbounded, &[]);
        let finished = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&finished);
        vm.on_finished(move |_| *counter.borrow_mut() += 1);

        assert!(vm.poll().is_empty());
        vm.stop().await;
        assert_eq!(*finished.borrow(), 0);
        assert_eq!(vm.run_state(), RunState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_reach_subscribers_in_order() {
        let mut vm = counting_vm(ChannelPolicy::Unbounded, &[]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        vm.subscribe("collector", move |frame: &Snapshot| {
            sink.borrow_mut().push(frame.readings()[0]);
            Ok(())
        });

        vm.start().unwrap();
        assert!(vm.is_running());
        sleep(ms(550)).await;

        let batch = vm.poll();
        assert_eq!(values(&batch), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(*seen.borrow(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(vm.latest_frame().unwrap().readings(), &[4.0]);
        assert_eq!(vm.series(0), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(vm.padded_series(0).len(), 8);

        vm.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let mut vm = counting_vm(ChannelPolicy::Unbounded, &[]);
        vm.start().unwrap();
        sleep(ms(250)).await;
        vm.start().unwrap();
        sleep(ms(100)).await;

        assert_eq!(values(&vm.poll()), vec![0.0, 1.0, 2.0]);
        vm.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_after_stop() {
        let mut vm = counting_vm(ChannelPolicy::Unbounded, &[]);
        let statuses = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&statuses);
        vm.on_finished(move |status| sink.borrow_mut().push(status.clone()));

        vm.start().unwrap();
        sleep(ms(350)).await;
        vm.stop().await;
        vm.stop().await;

        sleep(ms(500)).await;
        assert!(vm.poll().is_empty());
        assert!(!vm.is_running());

        let statuses = statuses.borrow();
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_overflow_keeps_latest() {
        let mut vm = counting_vm(ChannelPolicy::Bounded(3), &[]);
        vm.start().unwrap();
        sleep(ms(1050)).await;

        assert_eq!(values(&vm.poll()), vec![7.0, 8.0, 9.0]);
        assert_eq!(vm.dropped(), 7);
        vm.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_is_a_fresh_pipeline() {
        let mut vm = counting_vm(ChannelPolicy::Unbounded, &[]);
        vm.start().unwrap();
        sleep(ms(350)).await;
        assert_eq!(vm.poll().len(), 3);
        vm.stop().await;

        vm.start().unwrap();
        assert!(vm.history().is_empty());
        assert!(vm.latest_frame().is_none());
        sleep(ms(250)).await;
        assert_eq!(values(&vm.poll()), vec![0.0, 1.0]);
        vm.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_failure_skips_one_tick() {
        let mut vm = counting_vm(ChannelPolicy::Unbounded, &[2]);
        vm.start().unwrap();
        sleep(ms(550)).await;

        assert_eq!(values(&vm.poll()), vec![0.0, 1.0, 3.0, 4.0]);
        assert!(vm.is_running());
        vm.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_subscribers_are_isolated() {
        let mut vm = counting_vm(ChannelPolicy::Unbounded, &[]);
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);

        vm.subscribe("broken", |_: &Snapshot| anyhow::bail!("canvas gone"));
        vm.subscribe("panicky", |_: &Snapshot| -> anyhow::Result<()> { panic!("boom") });
        vm.subscribe("healthy", move |_: &Snapshot| {
            *sink.borrow_mut() += 1;
            Ok(())
        });

        vm.start().unwrap();
        sleep(ms(250)).await;
        assert_eq!(vm.poll().len(), 2);
        assert_eq!(*seen.borrow(), 2);

        let errors = vm.take_render_errors();
        assert_eq!(errors.len(), 4);
        assert!(errors[0].to_string().contains("canvas gone"));
        assert!(errors[1].to_string().contains("boom"));
        assert!(vm.take_render_errors().is_empty());
        vm.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_gone_finishes_without_stop() {
        let factory: SamplerFactory = Box::new(|_| {
            let mut ticks = 0;
            let sampler = move || {
                ticks += 1;
                if ticks > 2 {
                    Err(SampleError::SourceGone("process 77 exited".into()))
                } else {
                    Ok(Snapshot::now(vec![ticks as f64]))
                }
            };
            Ok(Box::new(sampler) as Box<dyn Sampler>)
        });
        let options = MonitorOptions {
            period: ms(100),
            policy: ChannelPolicy::Unbounded,
            history_length: 4,
        };
        let mut vm = MonitorViewModel::new("proc", options, factory, RawPresenter);
        vm.on_sample_error(std::sync::Arc::new(|_: &SampleError| {}));

        let statuses = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&statuses);
        vm.on_finished(move |status| sink.borrow_mut().push(status.clone()));

        vm.start().unwrap();
        sleep(ms(450)).await;

        assert_eq!(values(&vm.poll()), vec![1.0, 2.0]);
        assert!(!vm.is_running());
        assert_eq!(vm.run_state(), RunState::Stopped);
        {
            let statuses = statuses.borrow();
            assert_eq!(statuses.len(), 1);
            assert!(statuses[0].success);
            assert!(statuses[0].message.contains("77"));
        }

        // Already finished: stop must not notify twice
        vm.stop().await;
        assert_eq!(statuses.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_source_gone_restarts_without_poll() {
        let runs = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        let counter = std::sync::Arc::clone(&runs);
        let factory: SamplerFactory = Box::new(move |_| {
            let run = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let mut ticks = 0;
            let sampler = move || {
                ticks += 1;
                if ticks == 2 {
                    Err(SampleError::SourceGone("process 12 exited".into()))
                } else {
                    Ok(Snapshot::now(vec![run as f64]))
                }
            };
            Ok(Box::new(sampler) as Box<dyn Sampler>)
        });
        let options = MonitorOptions {
            period: ms(100),
            policy: ChannelPolicy::Unbounded,
            history_length: 4,
        };
        let mut vm = MonitorViewModel::new("proc", options, factory, RawPresenter);
        vm.on_sample_error(std::sync::Arc::new(|_: &SampleError| {}));
        let statuses = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&statuses);
        vm.on_finished(move |status| sink.borrow_mut().push(status.clone()));

        vm.start().unwrap();
        sleep(ms(350)).await;
        assert!(!vm.is_running());

        // The ended run is collected and a new one spawned
        vm.start().unwrap();
        assert!(vm.is_running());
        assert_eq!(statuses.borrow().len(), 1);
        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 2);

        sleep(ms(150)).await;
        assert_eq!(values(&vm.poll()), vec![1.0]);
        assert!(vm.is_running());
        vm.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_handlers_fire_on_each_start() {
        let mut vm = counting_vm(ChannelPolicy::Unbounded, &[]);
        let started = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&started);
        vm.on_started(move |event| sink.borrow_mut().push(event.clone()));

        vm.start().unwrap();
        vm.start().unwrap();
        vm.stop().await;
        vm.start().unwrap();
        vm.stop().await;

        let started = started.borrow();
        assert_eq!(started.len(), 2);
        assert_eq!(
            started[0],
            MonitorStarted {
                monitor: "test".to_string(),
                period: ms(100),
            }
        );
    }

    #[tokio::test]
    async fn test_zero_period_is_rejected() {
        let mut vm = counting_vm(ChannelPolicy::Unbounded, &[]);
        assert!(matches!(vm.set_period(Duration::ZERO), Err(MonitorError::ZeroPeriod(_))));
        assert_eq!(vm.period(), ms(100));

        let factory: SamplerFactory =
            Box::new(|_| Ok(Box::new(CountingSampler::new()) as Box<dyn Sampler>));
        let options = MonitorOptions {
            period: Duration::ZERO,
            policy: ChannelPolicy::Unbounded,
            history_length: 4,
        };
        let mut vm = MonitorViewModel::new("zero", options, factory, RawPresenter);
        assert!(matches!(vm.start(), Err(MonitorError::ZeroPeriod(_))));
        assert!(!vm.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_period_while_running_keeps_history() {
        let mut vm = counting_vm(ChannelPolicy::Unbounded, &[]);
        vm.start().unwrap();
        sleep(ms(250)).await;
        assert_eq!(values(&vm.poll()), vec![0.0, 1.0]);

        vm.set_period(ms(50)).unwrap();
        assert_eq!(vm.period(), ms(50));
        sleep(ms(170)).await;

        assert_eq!(values(&vm.poll()), vec![2.0, 3.0, 4.0]);
        assert_eq!(vm.series(0), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(vm.is_running());
        vm.stop().await;
    }

    #[tokio::test]
    async fn test_factory_failure_is_reported_by_start() {
        let factory: SamplerFactory =
            Box::new(|_| Err(SampleError::NoSuchProcess("ghost".into())));
        let options = MonitorOptions {
            period: ms(100),
            policy: ChannelPolicy::Unbounded,
            history_length: 4,
        };
        let mut vm = MonitorViewModel::new("ghost", options, factory, RawPresenter);

        let err = vm.start().unwrap_err();
        assert!(matches!(err, MonitorError::Sample(SampleError::NoSuchProcess(_))));
        assert!(!vm.is_running());
    }

    #[test]
    fn test_process_view_model_for_unknown_target() {
        let err = ProcessViewModel::process(
            "no-such-process-pulsemon-xyz",
            &MonitorSettings::default(),
            ChannelPolicy::Unbounded,
        )
        .err()
        .unwrap();
        assert!(matches!(err, MonitorError::Sample(SampleError::NoSuchProcess(_))));
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
