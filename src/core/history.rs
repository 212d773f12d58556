//! Fixed-capacity rolling history for sparklines

use std::collections::VecDeque;

use crate::core::Snapshot;

/// Ring of the most recent snapshots; the oldest is evicted on overflow.
///
/// Owned by the view-model and only touched from the UI context.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    /// Values of one unit, oldest first. Snapshots missing the unit read as 0.0.
    pub fn series(&self, unit: usize) -> Vec<f64> {
        self.series_by(|s| s.reading(unit).unwrap_or(0.0))
    }

    /// Any derived value per snapshot, oldest first
    pub fn series_by<F>(&self, f: F) -> Vec<f64>
    where
        F: Fn(&Snapshot) -> f64,
    {
        self.entries.iter().map(f).collect()
    }

    /// Left-pad a series with zeros up to capacity so a chart keeps its width
    pub fn pad(&self, mut series: Vec<f64>) -> Vec<f64> {
        if series.len() < self.capacity {
            let mut padded = vec![0.0; self.capacity - series.len()];
            padded.append(&mut series);
            return padded;
        }
        series
    }
}
