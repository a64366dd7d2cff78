//! Level-triggered reconciliation of the global configuration.
//!
//! [`ConfigReconciler::sync`] compares the observed object against the
//! configuration the controller last applied. It never looks at the event
//! that caused the key to be queued: a deleted object is recreated from the
//! applied state, a changed object becomes the new applied state and is
//! pushed to every dependent.

use crate::desired::DesiredState;
use crate::error::ControllerResult;
use crate::propagator::Propagator;
use crate::resource::{ConfigResource, ConfigSpec, ObjectKey};
use crate::store::{ConfigClient, ConfigLister, StoreError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// What a successful [`ConfigReconciler::sync`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No target name is configured; nothing was done.
    Misconfigured,
    /// The key names some other object.
    Ignored,
    /// The observed payload equals the applied one.
    InSync,
    /// The object was missing and has been created from the applied state.
    Recreated,
    /// The observed object was adopted and pushed to all dependents, or a
    /// previously failed push was completed.
    Converged,
}

/// Reconciles one configuration object against the applied state.
pub struct ConfigReconciler<S> {
    target_name: Option<String>,
    desired: DesiredState<S>,
    lister: Arc<dyn ConfigLister<S>>,
    client: Arc<dyn ConfigClient<S>>,
    propagator: Propagator<S>,
    /// Set while the applied configuration has not reached every dependent.
    propagation_pending: AtomicBool,
    /// Held while the target is looked up, adopted and propagated. Keys
    /// such as `global` and `ns/global` are distinct in the queue but name
    /// the same object.
    target_lock: Mutex<()>,
}

impl<S: ConfigSpec> ConfigReconciler<S> {
    /// Creates a reconciler for the object called `target_name`, starting
    /// from `initial` as the applied configuration.
    pub fn new(
        target_name: Option<String>,
        initial: ConfigResource<S>,
        lister: Arc<dyn ConfigLister<S>>,
        client: Arc<dyn ConfigClient<S>>,
        propagator: Propagator<S>,
    ) -> Self {
        Self {
            target_name,
            desired: DesiredState::new(initial),
            lister,
            client,
            propagator,
            propagation_pending: AtomicBool::new(false),
            target_lock: Mutex::new(()),
        }
    }

    /// Brings the store and the dependents in line for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed, the store lookup or the
    /// recreate fails, or a dependent rejects the configuration.
    pub fn sync(&self, key: &str) -> ControllerResult<SyncOutcome> {
        let key = ObjectKey::parse(key)?;

        let Some(target) = self.target_name.as_deref().filter(|name| !name.is_empty()) else {
            error!(%key, "no configuration name set, skipping");
            return Ok(SyncOutcome::Misconfigured);
        };

        if key.name != target {
            trace!(%key, target_name = target, "ignoring unrelated configuration");
            return Ok(SyncOutcome::Ignored);
        }

        let _guard = self.target_lock.lock();
        match self.lister.get(&key.name) {
            Err(StoreError::NotFound { .. }) => {
                warn!(%key, "configuration no longer exists, recreating");
                self.recreate()?;
                Ok(SyncOutcome::Recreated)
            }
            Err(err) => Err(err.into()),
            Ok(observed) => {
                debug!(%key, version = observed.meta.resource_version, "found configuration");
                let desired = self.desired.snapshot();
                if !observed.same_spec(&desired) {
                    self.desired.replace(Arc::new(observed));
                } else if !self.propagation_pending.load(Ordering::Acquire) {
                    return Ok(SyncOutcome::InSync);
                } else {
                    debug!(%key, "retrying propagation of applied configuration");
                }
                self.propagate()?;
                Ok(SyncOutcome::Converged)
            }
        }
    }

    /// Returns the applied configuration.
    pub fn desired(&self) -> Arc<ConfigResource<S>> {
        self.desired.snapshot()
    }

    /// Returns the configured target name.
    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref()
    }

    /// Returns the dependents this reconciler updates.
    pub fn propagator(&self) -> &Propagator<S> {
        &self.propagator
    }

    fn recreate(&self) -> ControllerResult<()> {
        let fresh = self.desired.snapshot().for_create();
        match self.client.create(&fresh) {
            Ok(created) => {
                info!(name = %created.meta.name, version = created.meta.resource_version, "recreated configuration");
                Ok(())
            }
            Err(err) => {
                error!(name = %fresh.meta.name, error = %err, "failed to recreate configuration");
                Err(err.into())
            }
        }
    }

    fn propagate(&self) -> ControllerResult<()> {
        let config = self.desired.snapshot();
        self.propagation_pending.store(true, Ordering::Release);
        self.propagator.propagate(&config)?;
        self.propagation_pending.store(false, Ordering::Release);
        info!(
            name = %config.meta.name,
            version = config.meta.resource_version,
            spec = ?config.spec,
            "applied configuration"
        );
        Ok(())
    }
}

impl<S> std::fmt::Debug for ConfigReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigReconciler")
            .field("target_name", &self.target_name)
            .field("propagator", &self.propagator)
            .finish_non_exhaustive()
    }
}
