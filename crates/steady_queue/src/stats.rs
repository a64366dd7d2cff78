//! Queue statistics.
//!
//! Counters are updated by the queue itself and can be read while workers
//! are running. They are monotonically increasing.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Work queue counters.
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Calls to `add` accepted while the queue was running.
    adds: AtomicU64,
    /// Adds that were absorbed because the key was already pending.
    deduplicated: AtomicU64,
    /// Keys handed out by `get`.
    gets: AtomicU64,
    /// Calls to `done`.
    dones: AtomicU64,
    /// Keys re-queued by `done` because they were re-added while processing.
    requeued_dirty: AtomicU64,
    /// Keys scheduled through the rate limiter.
    rate_limited: AtomicU64,
    /// Calls to `forget`.
    forgets: AtomicU64,
}

impl QueueStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_add(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_done(&self) {
        self.dones.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_requeued_dirty(&self) {
        self.requeued_dirty.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forget(&self) {
        self.forgets.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of accepted adds.
    pub fn adds(&self) -> u64 {
        self.adds.load(Ordering::Relaxed)
    }

    /// Returns the number of adds absorbed by deduplication.
    pub fn deduplicated(&self) -> u64 {
        self.deduplicated.load(Ordering::Relaxed)
    }

    /// Returns the number of keys handed to workers.
    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Returns the number of completed items.
    pub fn dones(&self) -> u64 {
        self.dones.load(Ordering::Relaxed)
    }

    /// Returns the number of dirty re-queues performed by `done`.
    pub fn requeued_dirty(&self) -> u64 {
        self.requeued_dirty.load(Ordering::Relaxed)
    }

    /// Returns the number of rate-limited re-queues.
    pub fn rate_limited(&self) -> u64 {
        self.rate_limited.load(Ordering::Relaxed)
    }

    /// Returns the number of `forget` calls.
    pub fn forgets(&self) -> u64 {
        self.forgets.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            adds: self.adds(),
            deduplicated: self.deduplicated(),
            gets: self.gets(),
            dones: self.dones(),
            requeued_dirty: self.requeued_dirty(),
            rate_limited: self.rate_limited(),
            forgets: self.forgets(),
        }
    }
}

/// A point-in-time copy of [`QueueStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QueueStatsSnapshot {
    /// Accepted adds.
    pub adds: u64,
    /// Adds absorbed by deduplication.
    pub deduplicated: u64,
    /// Keys handed to workers.
    pub gets: u64,
    /// Completed items.
    pub dones: u64,
    /// Dirty re-queues performed by `done`.
    pub requeued_dirty: u64,
    /// Rate-limited re-queues.
    pub rate_limited: u64,
    /// `forget` calls.
    pub forgets: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = QueueStats::new();
        assert_eq!(stats.snapshot(), QueueStatsSnapshot::default());
    }

    #[test]
    fn snapshot_reflects_counters() {
        let stats = QueueStats::new();
        stats.record_add();
        stats.record_add();
        stats.record_deduplicated();
        stats.record_get();
        stats.record_done();
        stats.record_rate_limited();

        let snap = stats.snapshot();
        assert_eq!(snap.adds, 2);
        assert_eq!(snap.deduplicated, 1);
        assert_eq!(snap.gets, 1);
        assert_eq!(snap.dones, 1);
        assert_eq!(snap.rate_limited, 1);
        assert_eq!(snap.forgets, 0);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(QueueStats::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    s.record_add();
                    s.record_get();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.adds(), 800);
        assert_eq!(stats.gets(), 800);
    }
}
