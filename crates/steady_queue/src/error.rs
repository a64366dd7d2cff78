//! Error types for the work queue.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur while building or running a queue.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Rate limiter settings are inconsistent.
    #[error("invalid rate limit configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// The background timer thread could not be started.
    #[error("failed to spawn queue timer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl QueueError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
