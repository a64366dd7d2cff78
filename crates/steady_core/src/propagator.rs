//! Fan-out of a new configuration to dependent controllers.

use crate::error::{ControllerError, ControllerResult};
use crate::resource::ConfigResource;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Error reported by a dependent that could not take a configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DependentError {
    message: String,
}

impl DependentError {
    /// Creates an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A component whose behavior follows the global configuration.
pub trait Dependent<S>: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Applies `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dependent rejected or failed to apply the
    /// configuration. The update is retried later.
    fn update_config(&self, config: &ConfigResource<S>) -> Result<(), DependentError>;
}

/// Ordered list of dependents.
///
/// Dependents are updated sequentially in registration order and
/// propagation stops at the first failure.
pub struct Propagator<S> {
    dependents: Vec<Arc<dyn Dependent<S>>>,
}

impl<S> Propagator<S> {
    /// Creates a propagator over `dependents`, in order.
    pub fn new(dependents: Vec<Arc<dyn Dependent<S>>>) -> Self {
        Self { dependents }
    }

    /// Pushes `config` to every dependent.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Dependent`] naming the first dependent
    /// that failed. Later dependents are not called.
    pub fn propagate(&self, config: &ConfigResource<S>) -> ControllerResult<()> {
        for dependent in &self.dependents {
            if let Err(source) = dependent.update_config(config) {
                error!(dependent = dependent.name(), error = %source, "dependent rejected configuration");
                return Err(ControllerError::Dependent {
                    dependent: dependent.name().to_string(),
                    source,
                });
            }
            debug!(dependent = dependent.name(), "dependent updated");
        }
        Ok(())
    }

    /// Returns the dependent names in call order.
    pub fn names(&self) -> Vec<&str> {
        self.dependents.iter().map(|d| d.name()).collect()
    }

    /// Returns the number of dependents.
    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    /// Returns true if there are no dependents.
    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

impl<S> Default for Propagator<S> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<S> std::fmt::Debug for Propagator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Propagator")
            .field("dependents", &self.names())
            .finish()
    }
}
