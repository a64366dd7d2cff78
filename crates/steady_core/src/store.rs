//! Read and write seams over the configuration store.
//!
//! The controller reads through a [`ConfigLister`], normally backed by a
//! local cache, and only writes through a [`ConfigClient`] when the
//! configuration has to be recreated.

use crate::resource::ConfigResource;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by store implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No object with this name exists.
    #[error("configuration {name:?} not found")]
    NotFound {
        /// The requested name.
        name: String,
    },

    /// An object with this name already exists.
    #[error("configuration {name:?} already exists")]
    AlreadyExists {
        /// The conflicting name.
        name: String,
    },

    /// The store could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    /// Creates an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Returns true for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Cached read access to configuration objects.
pub trait ConfigLister<S>: Send + Sync {
    /// Returns the object called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the object does not exist, or
    /// another error if the lookup itself failed.
    fn get(&self, name: &str) -> StoreResult<ConfigResource<S>>;
}

/// Write access to the store.
pub trait ConfigClient<S>: Send + Sync {
    /// Creates `config` and returns the stored object.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the create.
    fn create(&self, config: &ConfigResource<S>) -> StoreResult<ConfigResource<S>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(StoreError::not_found("global").is_not_found());
        assert!(!StoreError::already_exists("global").is_not_found());
        assert!(!StoreError::unavailable("timeout").is_not_found());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            StoreError::not_found("global").to_string(),
            "configuration \"global\" not found"
        );
    }
}
