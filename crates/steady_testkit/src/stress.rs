//! Stress harness for the work queue.
//!
//! Runs many workers against a small key space while producers keep adding
//! keys, and checks that no key is ever held by two workers at once.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use steady_queue::WorkQueue;

/// Configuration for a queue stress run.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Number of producer threads.
    pub producers: usize,
    /// Adds per producer.
    pub adds_per_producer: usize,
    /// Size of the key space.
    pub keys: usize,
    /// Simulated work per item.
    pub work: Duration,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            producers: 4,
            adds_per_producer: 500,
            keys: 16,
            work: Duration::from_micros(50),
        }
    }
}

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Items handed to workers.
    pub processed: usize,
    /// Times a worker received a key another worker still held.
    pub overlaps: usize,
    /// Keys still queued or held after the drain.
    pub leftover: usize,
    /// Wall time.
    pub duration: Duration,
}

/// Runs the stress scenario and drains the queue.
pub fn run_queue_stress(config: &StressConfig) -> StressResult {
    let queue = Arc::new(WorkQueue::new("stress"));
    let held = Arc::new(Mutex::new(HashSet::new()));
    let processed = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let workers: Vec<_> = (0..config.workers)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let held = Arc::clone(&held);
            let processed = Arc::clone(&processed);
            let overlaps = Arc::clone(&overlaps);
            let work = config.work;
            thread::spawn(move || {
                while let Some(key) = queue.get() {
                    if !held.lock().insert(key) {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    processed.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(work);
                    held.lock().remove(&key);
                    queue.done(&key);
                }
            })
        })
        .collect();

    let producers: Vec<_> = (0..config.producers)
        .map(|p| {
            let queue = Arc::clone(&queue);
            let adds = config.adds_per_producer;
            let keys = config.keys.max(1);
            thread::spawn(move || {
                for i in 0..adds {
                    queue.add((p + i) % keys);
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().expect("producer panicked");
    }
    while !(queue.is_empty() && queue.in_flight() == 0) {
        thread::sleep(Duration::from_millis(1));
    }
    queue.shut_down_with_drain();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    StressResult {
        processed: processed.load(Ordering::SeqCst),
        overlaps: overlaps.load(Ordering::SeqCst),
        leftover: queue.len() + queue.in_flight(),
        duration: start.elapsed(),
    }
}
