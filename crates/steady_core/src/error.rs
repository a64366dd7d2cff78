//! Error types for the controller.

use crate::propagator::DependentError;
use crate::store::StoreError;
use steady_queue::QueueError;
use thiserror::Error;

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors that can occur while reconciling or running the controller.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// A queue item could not be parsed as an object key.
    #[error("invalid resource key {key:?}: {reason}")]
    InvalidKey {
        /// The raw key taken from the queue.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The backing store or its cache failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A dependent controller rejected the configuration.
    #[error("dependent {dependent} failed to apply configuration: {source}")]
    Dependent {
        /// Name of the dependent that failed.
        dependent: String,
        /// The dependent's error.
        source: DependentError,
    },

    /// The change source never reported a synced cache.
    #[error("failed to wait for caches to sync: {reason}")]
    CacheSyncFailed {
        /// Why waiting stopped.
        reason: String,
    },

    /// The reconcile handler panicked.
    #[error("reconcile of {key:?} panicked: {message}")]
    Panicked {
        /// The key being processed.
        key: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// Controller settings are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Work queue error.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// I/O error (config files, thread spawning).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    /// Creates an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a cache sync error.
    pub fn cache_sync_failed(reason: impl Into<String>) -> Self {
        Self::CacheSyncFailed {
            reason: reason.into(),
        }
    }

    /// Returns true if the failed item should be retried with backoff.
    ///
    /// Store and dependent failures are transient. Malformed keys and
    /// configuration problems will not fix themselves and are dropped.
    pub fn is_retryable(&self) -> bool {
        match self {
            ControllerError::Store(_)
            | ControllerError::Dependent { .. }
            | ControllerError::Panicked { .. }
            | ControllerError::Io(_) => true,
            ControllerError::InvalidKey { .. }
            | ControllerError::CacheSyncFailed { .. }
            | ControllerError::InvalidConfig(_)
            | ControllerError::Queue(_) => false,
        }
    }
}
