//! The demo policy payload and its dependents.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use steady_core::{ConfigResource, Dependent, DependentError};
use tracing::info;

/// Cluster-wide security defaults distributed to the demo dependents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Reject violating workloads instead of patching them.
    pub enforcement: bool,
    /// Service account token mounting default.
    pub automount_service_account_token: String,
    /// Seccomp profile default.
    pub seccomp_profile: String,
    /// Network policy default.
    pub network_policy: String,
    /// Pod security context default.
    pub pod_security_context: String,
}

impl SecurityPolicy {
    /// The policy the demo starts from.
    pub fn baseline() -> Self {
        Self {
            enforcement: false,
            automount_service_account_token: "change-default".into(),
            seccomp_profile: "runtime/default".into(),
            network_policy: "default-deny".into(),
            pod_security_context: "nobody".into(),
        }
    }

    /// The same policy with enforcement toggled.
    #[must_use]
    pub fn toggled(&self) -> Self {
        Self {
            enforcement: !self.enforcement,
            ..self.clone()
        }
    }
}

/// A dependent that logs and counts the configurations it receives.
#[derive(Debug)]
pub struct LoggingDependent {
    name: String,
    updates: AtomicUsize,
}

impl LoggingDependent {
    /// Creates a dependent called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            updates: AtomicUsize::new(0),
        }
    }

    /// Returns how many configurations were applied.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl Dependent<SecurityPolicy> for LoggingDependent {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_config(&self, config: &ConfigResource<SecurityPolicy>) -> Result<(), DependentError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        info!(
            dependent = %self.name,
            enforcement = config.spec.enforcement,
            seccomp_profile = %config.spec.seccomp_profile,
            "applying policy"
        );
        Ok(())
    }
}
