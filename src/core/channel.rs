//! Single-producer/single-consumer snapshot channel
//!
//! The two halves are not `Clone`, so one writer and one reader is enforced
//! by the type system. Neither `push` nor `try_pop_all` ever blocks.

use crossbeam::queue::{ArrayQueue, SegQueue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::Snapshot;

/// Backpressure policy for a snapshot channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPolicy {
    /// Keep at most `n` snapshots; a push into a full channel discards the oldest
    Bounded(usize),
    Unbounded,
}

impl ChannelPolicy {
    /// Capacity 0 means unbounded, matching the config file convention
    pub fn from_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            ChannelPolicy::Unbounded
        } else {
            ChannelPolicy::Bounded(capacity)
        }
    }
}

/// Result of a non-blocking push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The channel was full; the oldest snapshot was discarded to admit this one
    DroppedOldest,
}

enum Queue {
    Bounded(ArrayQueue<Snapshot>),
    Unbounded(SegQueue<Snapshot>),
}

struct Shared {
    queue: Queue,
    dropped: AtomicU64,
}

impl Shared {
    fn len(&self) -> usize {
        match &self.queue {
            Queue::Bounded(q) => q.len(),
            Queue::Unbounded(q) => q.len(),
        }
    }
}

/// Create a connected sender/receiver pair
pub fn channel(policy: ChannelPolicy) -> (SnapshotSender, SnapshotReceiver) {
    let queue = match policy {
        // ArrayQueue panics on zero capacity
        ChannelPolicy::Bounded(capacity) => Queue::Bounded(ArrayQueue::new(capacity.max(1))),
        ChannelPolicy::Unbounded => Queue::Unbounded(SegQueue::new()),
    };
    let shared = Arc::new(Shared {
        queue,
        dropped: AtomicU64::new(0),
    });

    (
        SnapshotSender {
            shared: Arc::clone(&shared),
        },
        SnapshotReceiver { shared, policy },
    )
}

/// Writing half, owned by the worker loop
pub struct SnapshotSender {
    shared: Arc<Shared>,
}

impl SnapshotSender {
    pub fn push(&self, snapshot: Snapshot) -> PushOutcome {
        match &self.shared.queue {
            Queue::Bounded(q) => match q.force_push(snapshot) {
                None => PushOutcome::Queued,
                Some(_evicted) => {
                    self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    PushOutcome::DroppedOldest
                }
            },
            Queue::Unbounded(q) => {
                q.push(snapshot);
                PushOutcome::Queued
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reading half, owned by the view-model on the UI context
pub struct SnapshotReceiver {
    shared: Arc<Shared>,
    policy: ChannelPolicy,
}

impl SnapshotReceiver {
    /// Remove and return everything currently queued, oldest first
    pub fn try_pop_all(&self) -> Vec<Snapshot> {
        let mut batch = Vec::with_capacity(self.shared.len());
        match &self.shared.queue {
            Queue::Bounded(q) => {
                while let Some(snapshot) = q.pop() {
                    batch.push(snapshot);
                }
            }
            Queue::Unbounded(q) => {
                while let Some(snapshot) = q.pop() {
                    batch.push(snapshot);
                }
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total snapshots discarded by the drop-oldest policy
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn policy(&self) -> ChannelPolicy {
        self.policy
    }

    /// Whether the writing half is still alive
    pub fn is_connected(&self) -> bool {
        Arc::strong_count(&self.shared) > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(value: f64) -> Snapshot {
        Snapshot::now(vec![value])
    }

    fn values(batch: &[Snapshot]) -> Vec<f64> {
        batch.iter().map(|s| s.readings()[0]).collect()
    }

    #[test]
    fn test_unbounded_preserves_fifo_order() {
        let (tx, rx) = channel(ChannelPolicy::Unbounded);
        for i in 0..5 {
            assert_eq!(tx.push(snap(i as f64)), PushOutcome::Queued);
        }
        assert_eq!(values(&rx.try_pop_all()), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(rx.try_pop_all().is_empty());
    }

    #[test]
    fn test_bounded_overflow_keeps_latest() {
        let (tx, rx) = channel(ChannelPolicy::Bounded(3));
        let outcomes: Vec<_> = (0..7).map(|i| tx.push(snap(i as f64))).collect();

        assert_eq!(&outcomes[..3], &[PushOutcome::Queued; 3]);
        assert_eq!(&outcomes[3..], &[PushOutcome::DroppedOldest; 4]);
        assert_eq!(rx.dropped(), 4);
        assert_eq!(values(&rx.try_pop_all()), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_drain_between_overflow_windows() {
        let (tx, rx) = channel(ChannelPolicy::Bounded(2));
        tx.push(snap(0.0));
        tx.push(snap(1.0));
        tx.push(snap(2.0));
        assert_eq!(values(&rx.try_pop_all()), vec![1.0, 2.0]);

        tx.push(snap(3.0));
        assert_eq!(values(&rx.try_pop_all()), vec![3.0]);
        assert_eq!(rx.dropped(), 1);
    }

    #[test]
    fn test_empty_pop_never_blocks() {
        let (_tx, rx) = channel(ChannelPolicy::Bounded(4));
        assert!(rx.try_pop_all().is_empty());
        assert!(rx.is_empty());
    }

    #[test]
    fn test_receiver_sees_sender_drop() {
        let (tx, rx) = channel(ChannelPolicy::Unbounded);
        assert!(rx.is_connected());
        tx.push(snap(1.0));
        drop(tx);
        assert!(!rx.is_connected());
        assert_eq!(rx.try_pop_all().len(), 1);
    }

    #[test]
    fn test_capacity_zero_means_unbounded() {
        assert_eq!(ChannelPolicy::from_capacity(0), ChannelPolicy::Unbounded);
        assert_eq!(ChannelPolicy::from_capacity(8), ChannelPolicy::Bounded(8));
    }

    #[test]
    fn test_concurrent_writer_and_reader() {
        let (tx, rx) = channel(ChannelPolicy::Unbounded);
        let writer = std::thread::spawn(move || {
            for i in 0..1000 {
                tx.push(snap(i as f64));
            }
        });

        let mut seen = Vec::new();
        while seen.len() < 1000 {
            seen.extend(values(&rx.try_pop_all()));
        }
        writer.join().unwrap();

        let expected: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        assert_eq!(seen, expected);
    }
}
