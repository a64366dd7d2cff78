//! Re-queue delay policies.
//!
//! A [`RateLimiter`] decides how long a key waits before it is queued again
//! after a failure. Limiters are shared by all workers and must be
//! thread-safe.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Policy that computes re-queue delays per key.
pub trait RateLimiter<K>: Send + Sync {
    /// Returns how long `key` should wait before being queued again.
    ///
    /// Each call counts as one more failure for the key.
    fn when(&self, key: &K) -> Duration;

    /// Clears the failure history of `key`.
    fn forget(&self, key: &K);

    /// Returns how many times `key` has been re-queued since it was last
    /// forgotten.
    fn num_requeues(&self, key: &K) -> u32;
}

/// Per-key exponential backoff: `base * 2^failures`, capped at `max`.
#[derive(Debug)]
pub struct ExponentialFailureRateLimiter<K> {
    base_delay: Duration,
    max_delay: Duration,
    failures: Mutex<HashMap<K, u32>>,
}

impl<K> ExponentialFailureRateLimiter<K> {
    /// Creates a limiter with the given base and maximum delay.
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the delay for a key that has already failed `failures` times.
    pub fn delay_for_failures(&self, failures: u32) -> Duration {
        1u32.checked_shl(failures)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl<K> Default for ExponentialFailureRateLimiter<K> {
    fn default() -> Self {
        Self::new(Duration::from_millis(5), Duration::from_secs(1000))
    }
}

impl<K> RateLimiter<K> for ExponentialFailureRateLimiter<K>
where
    K: Clone + Eq + Hash + Send + Sync,
{
    fn when(&self, key: &K) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(key.clone()).or_insert(0);
        let delay = self.delay_for_failures(*count);
        *count = count.saturating_add(1);
        delay
    }

    fn forget(&self, key: &K) {
        self.failures.lock().remove(key);
    }

    fn num_requeues(&self, key: &K) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Overall token bucket shared by all keys.
///
/// Tokens refill at `qps` per second up to `burst`. Every call to
/// [`when`](RateLimiter::when) reserves one token; if the bucket is empty the
/// returned delay is the time until that reservation is covered.
#[derive(Debug)]
pub struct BucketRateLimiter {
    qps: f64,
    burst: u32,
    bucket: Mutex<Bucket>,
}

impl BucketRateLimiter {
    /// Creates a full bucket. `qps` must be positive and `burst` non-zero.
    pub fn new(qps: f64, burst: u32) -> Self {
        Self {
            qps,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last: Instant::now(),
            }),
        }
    }

    fn reserve(&self, now: Instant) -> Duration {
        let mut bucket = self.bucket.lock();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.qps).min(f64::from(self.burst));
        bucket.last = now;
        bucket.tokens -= 1.0;

        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.qps)
        }
    }
}

impl<K> RateLimiter<K> for BucketRateLimiter {
    fn when(&self, _key: &K) -> Duration {
        self.reserve(Instant::now())
    }

    fn forget(&self, _key: &K) {}

    fn num_requeues(&self, _key: &K) -> u32 {
        0
    }
}

/// Combines limiters: the longest delay wins.
pub struct MaxOfRateLimiter<K> {
    limiters: Vec<Box<dyn RateLimiter<K>>>,
}

impl<K> MaxOfRateLimiter<K> {
    /// Creates a limiter from the given policies.
    pub fn new(limiters: Vec<Box<dyn RateLimiter<K>>>) -> Self {
        Self { limiters }
    }
}

impl<K> RateLimiter<K> for MaxOfRateLimiter<K> {
    fn when(&self, key: &K) -> Duration {
        self.limiters
            .iter()
            .map(|limiter| limiter.when(key))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(&self, key: &K) {
        for limiter in &self.limiters {
            limiter.forget(key);
        }
    }

    fn num_requeues(&self, key: &K) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

impl<K> std::fmt::Debug for MaxOfRateLimiter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxOfRateLimiter")
            .field("limiters", &self.limiters.len())
            .finish()
    }
}

/// The conventional controller policy: per-key exponential backoff from
/// 5ms to 1000s, bounded overall by a 10 qps bucket with a burst of 100.
pub fn default_controller_rate_limiter<K>() -> MaxOfRateLimiter<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    MaxOfRateLimiter::new(vec![
        Box::new(ExponentialFailureRateLimiter::<K>::default()),
        Box::new(BucketRateLimiter::new(10.0, 100)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_per_failure() {
        let limiter =
            ExponentialFailureRateLimiter::new(Duration::from_millis(1), Duration::from_secs(1));

        assert_eq!(limiter.when(&"a"), Duration::from_millis(1));
        assert_eq!(limiter.when(&"a"), Duration::from_millis(2));
        assert_eq!(limiter.when(&"a"), Duration::from_millis(4));
        assert_eq!(limiter.num_requeues(&"a"), 3);

        // Keys are tracked independently.
        assert_eq!(limiter.when(&"b"), Duration::from_millis(1));
    }

    #[test]
    fn exponential_respects_max() {
        let limiter =
            ExponentialFailureRateLimiter::new(Duration::from_millis(1), Duration::from_millis(10));

        let delays: Vec<_> = (0..8).map(|_| limiter.when(&"a")).collect();
        assert_eq!(*delays.last().unwrap(), Duration::from_millis(10));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn exponential_survives_huge_failure_counts() {
        let limiter =
            ExponentialFailureRateLimiter::<&str>::new(Duration::from_millis(5), Duration::from_secs(1000));
        assert_eq!(limiter.delay_for_failures(u32::MAX), Duration::from_secs(1000));
    }

    #[test]
    fn forget_resets_backoff() {
        let limiter =
            ExponentialFailureRateLimiter::new(Duration::from_millis(1), Duration::from_secs(1));
        limiter.when(&"a");
        limiter.when(&"a");
        limiter.forget(&"a");

        assert_eq!(limiter.num_requeues(&"a"), 0);
        assert_eq!(limiter.when(&"a"), Duration::from_millis(1));
    }

    #[test]
    fn bucket_allows_burst_then_delays() {
        let limiter = BucketRateLimiter::new(10.0, 2);
        let now = Instant::now();

        assert_eq!(limiter.reserve(now), Duration::ZERO);
        assert_eq!(limiter.reserve(now), Duration::ZERO);

        let delay = limiter.reserve(now);
        assert!(delay > Duration::ZERO);
        assert!(delay <= Duration::from_millis(101));
    }

    #[test]
    fn bucket_refills_over_time() {
        let limiter = BucketRateLimiter::new(10.0, 1);
        let start = Instant::now();

        assert_eq!(limiter.reserve(start), Duration::ZERO);
        assert_eq!(
            limiter.reserve(start + Duration::from_millis(100)),
            Duration::ZERO
        );
    }

    #[test]
    fn max_of_picks_longest_delay() {
        let limiter: MaxOfRateLimiter<&str> = MaxOfRateLimiter::new(vec![
            Box::new(ExponentialFailureRateLimiter::new(
                Duration::from_millis(50),
                Duration::from_secs(1),
            )),
            Box::new(BucketRateLimiter::new(1000.0, 100)),
        ]);

        assert_eq!(limiter.when(&"a"), Duration::from_millis(50));
        assert_eq!(limiter.when(&"a"), Duration::from_millis(100));
        assert_eq!(limiter.num_requeues(&"a"), 2);

        limiter.forget(&"a");
        assert_eq!(limiter.num_requeues(&"a"), 0);
    }

    #[test]
    fn default_policy_starts_small() {
        let limiter = default_controller_rate_limiter::<String>();
        let key = "default/config".to_string();

        assert_eq!(limiter.when(&key), Duration::from_millis(5));
        assert_eq!(limiter.when(&key), Duration::from_millis(10));
    }
}
