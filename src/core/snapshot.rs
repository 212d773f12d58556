//! Snapshot: one timestamped batch of metric readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sample produced by a [`Sampler`](crate::core::Sampler).
///
/// Readings are positional, one per monitored unit (one per CPU core for the
/// cores sampler). A snapshot has no interior mutability and is moved, not
/// shared, from the worker into the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    readings: Vec<f64>,
}

impl Snapshot {
    /// Snapshot stamped with the current time
    pub fn now(readings: Vec<f64>) -> Self {
        Self::at(Utc::now(), readings)
    }

    pub fn at(taken_at: DateTime<Utc>, readings: Vec<f64>) -> Self {
        Self { taken_at, readings }
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn readings(&self) -> &[f64] {
        &self.readings
    }

    pub fn reading(&self, unit: usize) -> Option<f64> {
        self.readings.get(unit).copied()
    }

    /// Number of monitored units in this sample
    pub fn units(&self) -> usize {
        self.readings.len()
    }

    /// Mean of all readings, 0.0 for an empty snapshot
    pub fn mean(&self) -> f64 {
        if self.readings.is_empty() {
            return 0.0;
        }
        self.readings.iter().sum::<f64>() / self.readings.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_accessors() {
        let snap = Snapshot::now(vec![10.0, 30.0]);
        assert_eq!(snap.units(), 2);
        assert_eq!(snap.reading(1), Some(30.0));
        assert_eq!(snap.reading(2), None);
        assert_eq!(snap.mean(), 20.0);
    }

    #[test]
    fn test_empty_snapshot_mean() {
        assert_eq!(Snapshot::now(Vec::new()).mean(), 0.0);
    }

    #[test]
    fn test_snapshot_serializes_timestamp_and_readings() {
        let taken_at = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let json = serde_json::to_string(&Snapshot::at(taken_at, vec![1.5])).unwrap();
        assert!(json.contains("2025-01-02T03:04:05Z"));
        assert!(json.contains("1.5"));
    }
}
