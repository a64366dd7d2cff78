//! Delayed adds on top of [`WorkQueue`].
//!
//! Keys scheduled with [`DelayingQueue::add_after`] wait in a min-heap owned
//! by a background timer thread. When a key becomes ready the timer thread
//! calls [`WorkQueue::add`], so deduplication rules apply as usual.

use crate::error::QueueResult;
use crate::queue::WorkQueue;
use crate::stats::QueueStats;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug)]
struct Entry<K> {
    ready_at: Instant,
    seq: u64,
    key: K,
}

impl<K> PartialEq for Entry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl<K> Eq for Entry<K> {}

impl<K> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Entry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.ready_at, self.seq).cmp(&(other.ready_at, other.seq))
    }
}

#[derive(Debug)]
struct TimerState<K> {
    heap: BinaryHeap<Reverse<Entry<K>>>,
    /// Live schedule per key; heap entries with another sequence are stale.
    waiting: HashMap<K, (Instant, u64)>,
    next_seq: u64,
    stopped: bool,
}

#[derive(Debug)]
struct Timer<K> {
    state: Mutex<TimerState<K>>,
    wake: Condvar,
}

impl<K> Timer<K>
where
    K: Clone + Eq + Hash,
{
    fn new() -> Self {
        Self {
            state: Mutex::new(TimerState {
                heap: BinaryHeap::new(),
                waiting: HashMap::new(),
                next_seq: 0,
                stopped: false,
            }),
            wake: Condvar::new(),
        }
    }

    /// Schedules `key`. A key that is already waiting keeps the earlier
    /// ready time.
    fn schedule(&self, key: K, ready_at: Instant) {
        let mut state = self.state.lock();
        if state.stopped {
            return;
        }
        if let Some(&(existing, _)) = state.waiting.get(&key) {
            if existing <= ready_at {
                return;
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.waiting.insert(key.clone(), (ready_at, seq));
        state.heap.push(Reverse(Entry { ready_at, seq, key }));
        self.wake.notify_one();
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        state.heap.clear();
        state.waiting.clear();
        self.wake.notify_all();
    }

    fn waiting(&self) -> usize {
        self.state.lock().waiting.len()
    }

    fn run(&self, queue: &WorkQueue<K>) {
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                return;
            }

            let ready = Self::pop_ready(&mut *state, Instant::now());
            if !ready.is_empty() {
                MutexGuard::unlocked(&mut state, || {
                    for key in ready {
                        queue.add(key);
                    }
                });
                continue;
            }

            match state.heap.peek().map(|Reverse(entry)| entry.ready_at) {
                Some(deadline) => {
                    self.wake.wait_until(&mut state, deadline);
                }
                None => self.wake.wait(&mut state),
            }
        }
    }

    fn pop_ready(state: &mut TimerState<K>, now: Instant) -> Vec<K> {
        let mut ready = Vec::new();
        while state
            .heap
            .peek()
            .is_some_and(|Reverse(entry)| entry.ready_at <= now)
        {
            let Some(Reverse(entry)) = state.heap.pop() else {
                break;
            };
            let live = state.waiting.get(&entry.key).map(|&(_, seq)| seq) == Some(entry.seq);
            if live {
                state.waiting.remove(&entry.key);
                ready.push(entry.key);
            }
        }
        ready
    }
}

/// A [`WorkQueue`] that can also add keys after a delay.
#[derive(Debug)]
pub struct DelayingQueue<K>
where
    K: Clone + Eq + Hash,
{
    queue: Arc<WorkQueue<K>>,
    timer: Arc<Timer<K>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<K> DelayingQueue<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Creates the queue and starts its timer thread.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Spawn`](crate::QueueError::Spawn) if the timer
    /// thread cannot be started.
    pub fn new(name: impl Into<String>) -> QueueResult<Self> {
        let queue = Arc::new(WorkQueue::new(name));
        let timer = Arc::new(Timer::new());

        let handle = {
            let queue = Arc::clone(&queue);
            let timer = Arc::clone(&timer);
            thread::Builder::new()
                .name(format!("{}-timer", queue.name()))
                .spawn(move || timer.run(&queue))?
        };

        Ok(Self {
            queue,
            timer,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Adds `key` once `delay` has elapsed. A zero delay adds immediately.
    pub fn add_after(&self, key: K, delay: Duration) {
        if self.queue.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.queue.add(key);
            return;
        }
        trace!(queue = %self.queue.name(), ?delay, "scheduling delayed add");
        self.timer.schedule(key, Instant::now() + delay);
    }

    /// See [`WorkQueue::add`].
    pub fn add(&self, key: K) {
        self.queue.add(key);
    }

    /// See [`WorkQueue::get`].
    pub fn get(&self) -> Option<K> {
        self.queue.get()
    }

    /// See [`WorkQueue::done`].
    pub fn done(&self, key: &K) {
        self.queue.done(key);
    }

    /// Shuts the queue down and stops the timer. Pending delayed adds are
    /// dropped.
    pub fn shut_down(&self) {
        self.queue.shut_down();
        self.stop_timer();
    }

    /// Like [`shut_down`](Self::shut_down) but also waits for in-flight keys.
    pub fn shut_down_with_drain(&self) {
        self.stop_timer();
        self.queue.shut_down_with_drain();
    }

    /// See [`WorkQueue::is_shutting_down`].
    pub fn is_shutting_down(&self) -> bool {
        self.queue.is_shutting_down()
    }

    /// See [`WorkQueue::len`].
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// See [`WorkQueue::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// See [`WorkQueue::in_flight`].
    pub fn in_flight(&self) -> usize {
        self.queue.in_flight()
    }

    /// Returns the number of keys waiting on the timer.
    pub fn waiting(&self) -> usize {
        self.timer.waiting()
    }

    /// See [`WorkQueue::name`].
    pub fn name(&self) -> &str {
        self.queue.name()
    }

    /// See [`WorkQueue::stats`].
    pub fn stats(&self) -> &QueueStats {
        self.queue.stats()
    }

    fn stop_timer(&self) {
        self.timer.stop();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl<K> Drop for DelayingQueue<K>
where
    K: Clone + Eq + Hash,
{
    fn drop(&mut self) {
        self.timer.stop();
        if let Some(handle) = self.handle.get_mut().take() {
            let _ = handle.join();
        }
    }
}
