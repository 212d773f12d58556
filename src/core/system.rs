//! Samplers backed by the host OS through `sysinfo`

use std::collections::VecDeque;
use std::time::Duration;
use sysinfo::{Pid, System};
use tracing::debug;

use crate::core::{SampleError, Sampler, Snapshot};

/// Number of samples averaged for a smoothing window at a given period
pub fn smoothing_window(smoothing: Duration, period: Duration) -> usize {
    if period.is_zero() {
        return 1;
    }
    let ratio = smoothing.as_secs_f64() / period.as_secs_f64();
    (ratio.round() as usize).max(1)
}

/// Fixed-length moving average, pre-filled with zeros so the meter ramps up
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    pub fn new(len: usize) -> Self {
        let len = len.max(1);
        Self {
            window: std::iter::repeat(0.0).take(len).collect(),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) -> f64 {
        if let Some(old) = self.window.pop_front() {
            self.sum -= old;
        }
        self.window.push_back(value);
        self.sum += value;
        self.value()
    }

    pub fn value(&self) -> f64 {
        // Clamp away float drift from the running sum
        (self.sum / self.window.len() as f64).max(0.0)
    }
}

/// Per-core CPU usage in percent, one reading per logical core
pub struct CpuCoresSampler {
    system: System,
    averages: Vec<MovingAverage>,
    smoothing: Duration,
    window: usize,
}

impl CpuCoresSampler {
    pub fn new(period: Duration, smoothing: Duration) -> Result<Self, SampleError> {
        let mut system = System::new();
        // First refresh sets the baseline; usage is meaningful from the next one
        system.refresh_cpu();
        let cores = system.cpus().len();
        if cores == 0 {
            return Err(SampleError::Unavailable("no CPUs reported".into()));
        }

        let window = smoothing_window(smoothing, period);
        debug!(cores, window, "CPU sampler ready");
        Ok(Self {
            system,
            averages: vec![MovingAverage::new(window); cores],
            smoothing,
            window,
        })
    }

    pub fn cores(&self) -> usize {
        self.averages.len()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Sampler for CpuCoresSampler {
    fn sample(&mut self) -> Result<Snapshot, SampleError> {
        self.system.refresh_cpu();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(SampleError::Unavailable("CPU counters disappeared".into()));
        }
        // Hotplug: follow the new core count
        if cpus.len() != self.averages.len() {
            self.averages = vec![MovingAverage::new(self.window); cpus.len()];
        }

        let readings = cpus
            .iter()
            .zip(self.averages.iter_mut())
            .map(|(cpu, avg)| avg.push(cpu.cpu_usage() as f64))
            .collect();
        Ok(Snapshot::now(readings))
    }

    fn set_period(&mut self, period: Duration) {
        let window = smoothing_window(self.smoothing, period);
        if window != self.window {
            debug!(window, "CPU smoothing window resized");
            self.window = window;
            self.averages = vec![MovingAverage::new(window); self.averages.len()];
        }
    }
}

/// RAM and swap in bytes: `[ram_used, ram_total, swap_used, swap_total]`
pub struct MemorySampler {
    system: System,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for MemorySampler {
    fn sample(&mut self) -> Result<Snapshot, SampleError> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return Err(SampleError::Unavailable("memory totals not reported".into()));
        }
        Ok(Snapshot::now(vec![
            self.system.used_memory() as f64,
            total as f64,
            self.system.used_swap() as f64,
            self.system.total_swap() as f64,
        ]))
    }
}

/// A process picked by PID or exact name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTarget {
    pub pid: u32,
    pub name: String,
}

impl ProcessTarget {
    /// Resolve a numeric PID, or a name that matches exactly one process
    pub fn resolve(identifier: &str) -> Result<Self, SampleError> {
        let identifier = identifier.trim();
        let mut system = System::new();

        if let Ok(raw) = identifier.parse::<u32>() {
            let pid = Pid::from_u32(raw);
            if !system.refresh_process(pid) {
                return Err(SampleError::NoSuchProcess(identifier.to_string()));
            }
            let name = system
                .process(pid)
                .map(|p| p.name().to_string())
                .unwrap_or_default();
            return Ok(Self { pid: raw, name });
        }

        system.refresh_processes();
        let mut pids: Vec<u32> = system
            .processes_by_exact_name(identifier)
            .map(|p| p.pid().as_u32())
            .collect();
        pids.sort_unstable();
        pids.dedup();

        match pids.as_slice() {
            [] => Err(SampleError::NoSuchProcess(identifier.to_string())),
            [pid] => Ok(Self {
                pid: *pid,
                name: identifier.to_string(),
            }),
            many => Err(SampleError::AmbiguousProcess {
                name: identifier.to_string(),
                pids: many
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// CPU usage of one process as a share of the whole machine (0-100)
pub struct ProcessCpuSampler {
    system: System,
    pid: Pid,
    cores: usize,
}

impl ProcessCpuSampler {
    pub fn new(pid: u32) -> Result<Self, SampleError> {
        let mut system = System::new();
        system.refresh_cpu();
        let pid = Pid::from_u32(pid);
        if !system.refresh_process(pid) {
            return Err(SampleError::NoSuchProcess(pid.to_string()));
        }
        let cores = system.cpus().len().max(1);
        Ok(Self { system, pid, cores })
    }
}

impl Sampler for ProcessCpuSampler {
    fn sample(&mut self) -> Result<Snapshot, SampleError> {
        if !self.system.refresh_process(self.pid) {
            return Err(SampleError::SourceGone(format!("process {} exited", self.pid)));
        }
        let usage = self
            .system
            .process(self.pid)
            .map(|p| p.cpu_usage() as f64)
            .ok_or_else(|| SampleError::SourceGone(format!("process {} exited", self.pid)))?;

        Ok(Snapshot::now(vec![(usage / self.cores as f64).min(100.0)]))
    }
}
