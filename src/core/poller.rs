//! Consumer side: drains a view-model on a fixed cadence
//!
//! A render failure never stops the cadence; the next cycle is armed before
//! any rendering happens.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::core::view_model::{panic_message, MonitorViewModel};
use crate::core::{Presenter, Snapshot};

// Floor for the cadence; a zero interval would spin
const MIN_CADENCE: Duration = Duration::from_millis(1);

pub struct Poller {
    cadence: Duration,
    next_due: Instant,
    cycles: u64,
    failures: u64,
}

impl Poller {
    /// First cycle is due immediately
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence: cadence.max(MIN_CADENCE),
            next_due: Instant::now(),
            cycles: 0,
            failures: 0,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// How long a host event loop may block before the next cycle
    pub fn time_until_due(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Render calls that returned an error or panicked
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Run one cycle: re-arm, drain `vm`, render each snapshot in order.
    ///
    /// Returns the number of snapshots drained.
    pub fn cycle<P, R>(&mut self, vm: &mut MonitorViewModel<P>, mut render: R) -> usize
    where
        P: Presenter,
        R: FnMut(&Snapshot) -> anyhow::Result<()>,
    {
        self.next_due = Instant::now() + self.cadence;
        self.cycles += 1;

        let batch = vm.poll();
        for snapshot in &batch {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| render(snapshot)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{:#}", err),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            self.failures += 1;
            warn!(monitor = %vm.name(), %message, "Render failed, continuing");
        }
        batch.len()
    }

    /// Drive `vm` on this poller's cadence until `shutdown` turns true or its
    /// sender is dropped.
    pub async fn run<P, R>(
        &mut self,
        vm: &mut MonitorViewModel<P>,
        mut render: R,
        mut shutdown: watch::Receiver<bool>,
    ) where
        P: Presenter,
        R: FnMut(&Snapshot) -> anyhow::Result<()>,
    {
        let mut ticker = time::interval(self.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    self.cycle(vm, &mut render);
                }
            }
        }

        debug!(monitor = %vm.name(), cycles = self.cycles, "Poller finished");
    }
}
