//! Translation from raw snapshots to ready-to-render frames
//!
//! Views never see sampler-specific layouts; each presenter knows the reading
//! order of its sampler and produces a frame with everything a meter or
//! sparkline needs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{HistoryBuffer, Snapshot};
use crate::utils::{percent_to_rgb, Rgb};

pub trait Presenter {
    type Frame: Clone;

    fn present(&mut self, snapshot: &Snapshot, history: &HistoryBuffer) -> Self::Frame;
}

/// Global and per-core CPU usage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuFrame {
    pub taken_at: DateTime<Utc>,
    pub global: f64,
    pub cores: Vec<f64>,
    pub color: Rgb,
    /// Global usage over the rolling window, zero-padded to its capacity
    pub history: Vec<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CpuCoresPresenter;

impl Presenter for CpuCoresPresenter {
    type Frame = CpuFrame;

    fn present(&mut self, snapshot: &Snapshot, history: &HistoryBuffer) -> CpuFrame {
        let global = snapshot.mean();
        CpuFrame {
            taken_at: snapshot.taken_at(),
            global,
            cores: snapshot.readings().to_vec(),
            color: percent_to_rgb(global),
            history: history.pad(history.series_by(Snapshot::mean)),
        }
    }
}

/// Used/total bytes of one memory pool
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Usage {
    pub used: u64,
    pub total: u64,
    pub percent: f64,
}

impl Usage {
    pub fn new(used: u64, total: u64) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            used as f64 * 100.0 / total as f64
        };
        Self { used, total, percent }
    }
}

/// RAM and swap usage; `swap` is `None` on machines without swap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryFrame {
    pub taken_at: DateTime<Utc>,
    pub ram: Usage,
    pub swap: Option<Usage>,
    pub ram_color: Rgb,
    pub ram_history: Vec<f64>,
}

/// Reading order produced by [`MemorySampler`](crate::core::system::MemorySampler)
pub const MEM_RAM_USED: usize = 0;
pub const MEM_RAM_TOTAL: usize = 1;
pub const MEM_SWAP_USED: usize = 2;
pub const MEM_SWAP_TOTAL: usize = 3;

fn ram_percent(snapshot: &Snapshot) -> f64 {
    let reading = |unit| snapshot.reading(unit).unwrap_or(0.0) as u64;
    Usage::new(reading(MEM_RAM_USED), reading(MEM_RAM_TOTAL)).percent
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryPresenter;

impl Presenter for MemoryPresenter {
    type Frame = MemoryFrame;

    fn present(&mut self, snapshot: &Snapshot, history: &HistoryBuffer) -> MemoryFrame {
        let reading = |unit| snapshot.reading(unit).unwrap_or(0.0) as u64;
        let ram = Usage::new(reading(MEM_RAM_USED), reading(MEM_RAM_TOTAL));
        let swap_total = reading(MEM_SWAP_TOTAL);
        let swap = (swap_total > 0).then(|| Usage::new(reading(MEM_SWAP_USED), swap_total));

        MemoryFrame {
            taken_at: snapshot.taken_at(),
            ram,
            swap,
            ram_color: percent_to_rgb(ram.percent),
            ram_history: history.pad(history.series_by(ram_percent)),
        }
    }
}

/// CPU share of one process, normalized to the whole machine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessFrame {
    pub taken_at: DateTime<Utc>,
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub color: Rgb,
    pub history: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ProcessPresenter {
    pid: u32,
    name: String,
}

impl ProcessPresenter {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Presenter for ProcessPresenter {
    type Frame = ProcessFrame;

    fn present(&mut self, snapshot: &Snapshot, history: &HistoryBuffer) -> ProcessFrame {
        let cpu_percent = snapshot.reading(0).unwrap_or(0.0);
        ProcessFrame {
            taken_at: snapshot.taken_at(),
            pid: self.pid,
            name: self.name.clone(),
            cpu_percent,
            color: percent_to_rgb(cpu_percent),
            history: history.pad(history.series(0)),
        }
    }
}

/// Pass-through presenter for hosts that want raw snapshots
#[derive(Debug, Default, Clone, Copy)]
pub struct RawPresenter;

impl Presenter for RawPresenter {
    type Frame = Snapshot;

    fn present(&mut self, snapshot: &Snapshot, _history: &HistoryBuffer) -> Snapshot {
        snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_frame_global_is_core_mean() {
        let mut history = HistoryBuffer::new(3);
        let snap = Snapshot::now(vec![20.0, 60.0]);
        history.push(snap.clone());

        let frame = CpuCoresPresenter.present(&snap, &history);
        assert_eq!(frame.global, 40.0);
        assert_eq!(frame.cores, vec![20.0, 60.0]);
        assert_eq!(frame.history, vec![0.0, 0.0, 40.0]);
        assert_eq!(frame.color, percent_to_rgb(40.0));
    }

    #[test]
    fn test_memory_frame_without_swap() {
        let gib = 1024.0 * 1024.0 * 1024.0;
        let snap = Snapshot::now(vec![4.0 * gib, 16.0 * gib, 0.0, 0.0]);
        let frame = MemoryPresenter.present(&snap, &HistoryBuffer::new(0));

        assert_eq!(frame.ram.percent, 25.0);
        assert_eq!(frame.ram.total, 16 * 1024 * 1024 * 1024);
        assert!(frame.swap.is_none());
        assert!(frame.ram_history.is_empty());
    }

    #[test]
    fn test_memory_frame_with_swap() {
        let snap = Snapshot::now(vec![50.0, 100.0, 1.0, 4.0]);
        let frame = MemoryPresenter.present(&snap, &HistoryBuffer::new(0));
        assert_eq!(frame.swap, Some(Usage::new(1, 4)));
        assert_eq!(frame.swap.unwrap().percent, 25.0);
    }

    #[test]
    fn test_process_frame_carries_identity() {
        let mut presenter = ProcessPresenter::new(4242, "stress");
        let frame = presenter.present(&Snapshot::now(vec![12.5]), &HistoryBuffer::new(2));
        assert_eq!(frame.pid, 4242);
        assert_eq!(frame.name, "stress");
        assert_eq!(frame.cpu_percent, 12.5);
        assert_eq!(frame.history, vec![0.0, 0.0]);
    }

    #[test]
    fn test_usage_zero_total() {
        assert_eq!(Usage::new(10, 0).percent, 0.0);
    }
}
