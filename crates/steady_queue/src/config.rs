//! Rate limiter configuration.

use crate::error::{QueueError, QueueResult};
use crate::rate_limiter::{
    BucketRateLimiter, ExponentialFailureRateLimiter, MaxOfRateLimiter, RateLimiter,
};
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::time::Duration;

/// Settings for the default controller rate limiter.
///
/// Durations are written as milliseconds when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Delay after the first failure of a key.
    #[serde(rename = "base_delay_ms", with = "duration_ms")]
    pub base_delay: Duration,
    /// Upper bound for per-key backoff.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    /// Overall re-queue rate across all keys.
    pub qps: f64,
    /// Re-queues allowed in a burst before `qps` applies.
    pub burst: u32,
}

impl RateLimitConfig {
    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the overall rate and burst.
    #[must_use]
    pub fn with_bucket(mut self, qps: f64, burst: u32) -> Self {
        self.qps = qps;
        self.burst = burst;
        self
    }

    /// Checks that the settings describe a usable limiter.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConfig`] if `qps` is not a positive
    /// number, `burst` is zero, or `base_delay` exceeds `max_delay`.
    pub fn validate(&self) -> QueueResult<()> {
        if !(self.qps.is_finite() && self.qps > 0.0) {
            return Err(QueueError::invalid_config(format!(
                "qps must be positive, got {}",
                self.qps
            )));
        }
        if self.burst == 0 {
            return Err(QueueError::invalid_config("burst must be at least 1"));
        }
        if self.base_delay > self.max_delay {
            return Err(QueueError::invalid_config(format!(
                "base delay {:?} exceeds max delay {:?}",
                self.base_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Builds the max-of(exponential, bucket) limiter described by these
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns an error if [`validate`](Self::validate) fails.
    pub fn build<K>(&self) -> QueueResult<MaxOfRateLimiter<K>>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
    {
        self.validate()?;
        let limiters: Vec<Box<dyn RateLimiter<K>>> = vec![
            Box::new(ExponentialFailureRateLimiter::<K>::new(
                self.base_delay,
                self.max_delay,
            )),
            Box::new(BucketRateLimiter::new(self.qps, self.burst)),
        ];
        Ok(MaxOfRateLimiter::new(limiters))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_secs(1000),
            qps: 10.0,
            burst: 100,
        }
    }
}

/// Serializes a `Duration` as whole milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Writes the duration in milliseconds.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    /// Reads a duration from milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
