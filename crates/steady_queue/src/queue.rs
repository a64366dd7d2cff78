//! Deduplicating FIFO work queue.

use crate::stats::QueueStats;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use tracing::debug;

/// Bookkeeping guarded by the queue mutex.
///
/// A key is in `dirty` whenever it needs processing: either it sits in
/// `queue`, or it was re-added while a worker holds it in `processing`.
#[derive(Debug)]
struct QueueState<K> {
    queue: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
    shutting_down: bool,
}

/// A deduplicating FIFO of keys with per-key processing tracking.
///
/// # Invariants
///
/// - A key is handed to at most one caller of [`get`](Self::get) until
///   that caller reports [`done`](Self::done).
/// - Adding a key that is already queued does nothing.
/// - Adding a key that is being processed marks it dirty; it is queued
///   again exactly once when the holder calls `done`.
/// - Once shut down, `get` returns `None` and `add` is ignored, while
///   `done` on in-flight keys still takes effect.
#[derive(Debug)]
pub struct WorkQueue<K> {
    name: String,
    state: Mutex<QueueState<K>>,
    item_ready: Condvar,
    drained: Condvar,
    stats: QueueStats,
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash,
{
    /// Creates an empty queue. The name only appears in log output.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                shutting_down: false,
            }),
            item_ready: Condvar::new(),
            drained: Condvar::new(),
            stats: QueueStats::new(),
        }
    }

    /// Returns the queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marks `key` as needing processing.
    pub fn add(&self, key: K) {
        let mut state = self.state.lock();
        if state.shutting_down {
            return;
        }
        self.stats.record_add();

        if state.dirty.contains(&key) {
            self.stats.record_deduplicated();
            return;
        }
        state.dirty.insert(key.clone());

        // The holder re-queues it from `done`.
        if state.processing.contains(&key) {
            return;
        }

        state.queue.push_back(key);
        self.item_ready.notify_one();
    }

    /// Blocks until a key is available and marks it as processing.
    ///
    /// Returns `None` once the queue has been shut down; the caller should
    /// stop asking for work.
    pub fn get(&self) -> Option<K> {
        let mut state = self.state.lock();
        while state.queue.is_empty() && !state.shutting_down {
            self.item_ready.wait(&mut state);
        }
        if state.shutting_down {
            return None;
        }

        let key = state.queue.pop_front()?;
        state.dirty.remove(&key);
        state.processing.insert(key.clone());
        self.stats.record_get();
        Some(key)
    }

    /// Marks `key` as no longer processing.
    ///
    /// If the key was added again while it was being processed, it goes back
    /// on the queue.
    pub fn done(&self, key: &K) {
        let mut state = self.state.lock();
        self.stats.record_done();
        state.processing.remove(key);

        if !state.shutting_down && state.dirty.contains(key) {
            state.queue.push_back(key.clone());
            self.stats.record_requeued_dirty();
            self.item_ready.notify_one();
        }

        if state.processing.is_empty() {
            self.drained.notify_all();
        }
    }

    /// Stops handing out keys and wakes every blocked `get`.
    pub fn shut_down(&self) {
        let mut state = self.state.lock();
        if state.shutting_down {
            return;
        }
        state.shutting_down = true;
        debug!(
            queue = %self.name,
            pending = state.queue.len(),
            in_flight = state.processing.len(),
            "work queue shutting down"
        );
        self.item_ready.notify_all();
    }

    /// Shuts the queue down and blocks until every in-flight key is done.
    pub fn shut_down_with_drain(&self) {
        self.shut_down();
        let mut state = self.state.lock();
        while !state.processing.is_empty() {
            self.drained.wait(&mut state);
        }
        debug!(queue = %self.name, "work queue drained");
    }

    /// Returns true once [`shut_down`](Self::shut_down) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Returns the number of keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns true if no keys are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of keys currently held by workers.
    pub fn in_flight(&self) -> usize {
        self.state.lock().processing.len()
    }

    /// Returns the queue counters.
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}
