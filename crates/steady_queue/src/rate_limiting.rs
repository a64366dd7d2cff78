//! Rate-limited re-queueing.

use crate::delaying::DelayingQueue;
use crate::error::QueueResult;
use crate::rate_limiter::{default_controller_rate_limiter, RateLimiter};
use crate::stats::QueueStats;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A [`DelayingQueue`] whose retry delays come from a [`RateLimiter`].
///
/// Call [`add_rate_limited`](Self::add_rate_limited) after a transient
/// failure and [`forget`](Self::forget) once a key has been handled for
/// good, so that its next failure starts again from the base delay.
pub struct RateLimitingQueue<K>
where
    K: Clone + Eq + Hash,
{
    inner: DelayingQueue<K>,
    limiter: Arc<dyn RateLimiter<K>>,
}

impl<K> RateLimitingQueue<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Creates a queue using the given limiter.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer thread cannot be started.
    pub fn new(name: impl Into<String>, limiter: Arc<dyn RateLimiter<K>>) -> QueueResult<Self> {
        Ok(Self {
            inner: DelayingQueue::new(name)?,
            limiter,
        })
    }

    /// Creates a queue using [`default_controller_rate_limiter`].
    ///
    /// # Errors
    ///
    /// Returns an error if the timer thread cannot be started.
    pub fn with_default_limiter(name: impl Into<String>) -> QueueResult<Self> {
        Self::new(name, Arc::new(default_controller_rate_limiter::<K>()))
    }

    /// Adds `key` after the delay chosen by the rate limiter.
    pub fn add_rate_limited(&self, key: K) {
        let delay = self.limiter.when(&key);
        self.inner.stats().record_rate_limited();
        debug!(queue = %self.inner.name(), ?delay, "re-queueing with backoff");
        self.inner.add_after(key, delay);
    }

    /// Clears the retry history of `key`.
    pub fn forget(&self, key: &K) {
        self.limiter.forget(key);
        self.inner.stats().record_forget();
    }

    /// Returns how many times `key` has been re-queued since it was last
    /// forgotten.
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.limiter.num_requeues(key)
    }

    /// See [`DelayingQueue::add_after`].
    pub fn add_after(&self, key: K, delay: Duration) {
        self.inner.add_after(key, delay);
    }

    /// See [`WorkQueue::add`](crate::WorkQueue::add).
    pub fn add(&self, key: K) {
        self.inner.add(key);
    }

    /// See [`WorkQueue::get`](crate::WorkQueue::get).
    pub fn get(&self) -> Option<K> {
        self.inner.get()
    }

    /// See [`WorkQueue::done`](crate::WorkQueue::done).
    pub fn done(&self, key: &K) {
        self.inner.done(key);
    }

    /// See [`DelayingQueue::shut_down`].
    pub fn shut_down(&self) {
        self.inner.shut_down();
    }

    /// See [`DelayingQueue::shut_down_with_drain`].
    pub fn shut_down_with_drain(&self) {
        self.inner.shut_down_with_drain();
    }

    /// See [`WorkQueue::is_shutting_down`](crate::WorkQueue::is_shutting_down).
    pub fn is_shutting_down(&self) -> bool {
        self.inner.is_shutting_down()
    }

    /// See [`WorkQueue::len`](crate::WorkQueue::len).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// See [`WorkQueue::is_empty`](crate::WorkQueue::is_empty).
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// See [`WorkQueue::in_flight`](crate::WorkQueue::in_flight).
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight()
    }

    /// See [`DelayingQueue::waiting`].
    pub fn waiting(&self) -> usize {
        self.inner.waiting()
    }

    /// Returns the queue name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the queue counters.
    pub fn stats(&self) -> &QueueStats {
        self.inner.stats()
    }
}

impl<K> std::fmt::Debug for RateLimitingQueue<K>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitingQueue")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
