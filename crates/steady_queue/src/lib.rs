//! # Steady Queue
//!
//! Work queue primitives for level-triggered controllers.
//!
//! This crate provides:
//! - [`WorkQueue`] - deduplicating FIFO with per-key processing tracking
//! - [`DelayingQueue`] - adds keys after a delay using a timer thread
//! - [`RateLimitingQueue`] - re-queues keys with per-key backoff
//! - Pluggable [`RateLimiter`] policies (exponential, token bucket, max-of)
//!
//! ## Key Invariants
//!
//! - A key is never held by two workers at the same time
//! - Adding a key that is already queued is a no-op
//! - Adding a key that is being processed re-queues it exactly once,
//!   after the current holder calls `done`
//! - After shutdown no further `get` returns a key
//!
//! ## Example
//!
//! ```rust
//! use steady_queue::WorkQueue;
//!
//! let queue = WorkQueue::new("example");
//! queue.add("default/app".to_string());
//! queue.add("default/app".to_string());
//! assert_eq!(queue.len(), 1);
//!
//! let key = queue.get().unwrap();
//! queue.done(&key);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod delaying;
mod error;
mod queue;
mod rate_limiter;
mod rate_limiting;
mod stats;

pub use config::{duration_ms, RateLimitConfig};
pub use delaying::DelayingQueue;
pub use error::{QueueError, QueueResult};
pub use queue::WorkQueue;
pub use rate_limiter::{
    default_controller_rate_limiter, BucketRateLimiter, ExponentialFailureRateLimiter,
    MaxOfRateLimiter, RateLimiter,
};
pub use rate_limiting::RateLimitingQueue;
pub use stats::{QueueStats, QueueStatsSnapshot};
