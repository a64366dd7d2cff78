//! Sample configuration payloads and controller helpers.

use crate::mocks::{RecordingDependent, ScriptedStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use steady_core::{
    ConfigReconciler, ConfigResource, ControllerConfig, Dependent, Propagator,
};
use steady_queue::RateLimitConfig;
use tempfile::TempDir;

/// Name of the configuration object used throughout the tests.
pub const TARGET: &str = "global";

/// A security policy configuration, the kind of payload a cluster-wide
/// admission controller distributes to its sub-controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySpec {
    /// Whether violations are rejected rather than patched.
    pub enforcement: bool,
    /// Default for mounting service account tokens.
    pub automount_service_account_token: String,
    /// Default seccomp profile.
    pub seccomp_profile: String,
    /// Default network policy name.
    pub network_policy: String,
    /// Default pod security context.
    pub pod_security_context: String,
}

impl PolicySpec {
    /// A restrictive policy.
    pub fn strict() -> Self {
        Self {
            enforcement: true,
            automount_service_account_token: "forbidden".into(),
            seccomp_profile: "runtime/default".into(),
            network_policy: "deny-all".into(),
            pod_security_context: "nobody".into(),
        }
    }

    /// A permissive policy.
    pub fn relaxed() -> Self {
        Self {
            enforcement: false,
            automount_service_account_token: "change-default".into(),
            seccomp_profile: "unconfined".into(),
            network_policy: "allow-all".into(),
            pod_security_context: "none".into(),
        }
    }
}

impl Default for PolicySpec {
    fn default() -> Self {
        Self::strict()
    }
}

/// Builds a cluster-scoped policy configuration.
pub fn policy_config(name: &str, spec: PolicySpec) -> ConfigResource<PolicySpec> {
    ConfigResource::new(name, spec)
}

/// Controller settings with short timeouts and backoff suited to tests.
pub fn fast_controller_config() -> ControllerConfig {
    ControllerConfig::for_target(TARGET)
        .with_queue_name("test")
        .with_cache_sync_poll_interval(Duration::from_millis(5))
        .with_rate_limit(
            RateLimitConfig::default()
                .with_base_delay(Duration::from_millis(5))
                .with_max_delay(Duration::from_millis(200)),
        )
}

/// Builds a reconciler for [`TARGET`] over a scripted store, starting from
/// [`PolicySpec::strict`].
pub fn reconciler_for(
    store: &Arc<ScriptedStore<PolicySpec>>,
    dependents: Vec<Arc<RecordingDependent<PolicySpec>>>,
) -> ConfigReconciler<PolicySpec> {
    let dependents = dependents
        .into_iter()
        .map(|d| d as Arc<dyn Dependent<PolicySpec>>)
        .collect();
    ConfigReconciler::new(
        Some(TARGET.to_string()),
        policy_config(TARGET, PolicySpec::strict()),
        store.clone(),
        store.clone(),
        Propagator::new(dependents),
    )
}

/// A JSON controller config written to a temporary directory.
pub struct TempConfigFile {
    path: PathBuf,
    _dir: TempDir,
}

impl TempConfigFile {
    /// Writes `config` as JSON.
    pub fn new(config: &ControllerConfig) -> Self {
        let json = serde_json::to_string_pretty(config).expect("Failed to serialize config");
        Self::raw(&json)
    }

    /// Writes `contents` verbatim.
    pub fn raw(contents: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("steady.json");
        std::fs::write(&path, contents).expect("Failed to write config file");
        Self { path, _dir: dir }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_differ() {
        assert_ne!(PolicySpec::strict(), PolicySpec::relaxed());
        assert_eq!(PolicySpec::default(), PolicySpec::strict());
    }

    #[test]
    fn temp_config_file_round_trips() {
        let file = TempConfigFile::new(&fast_controller_config());
        let loaded = ControllerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, fast_controller_config());
    }
}
