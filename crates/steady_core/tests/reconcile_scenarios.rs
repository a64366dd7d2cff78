//! Reconciliation scenarios against a scripted store.

use std::sync::Arc;
use steady_core::{ControllerError, StoreError, SyncOutcome};
use steady_testkit::prelude::*;

fn dependents(log: &CallLog<PolicySpec>) -> Vec<Arc<RecordingDependent<PolicySpec>>> {
    vec![
        RecordingDependent::new("pods", log),
        RecordingDependent::new("network", log),
        RecordingDependent::new("admission", log),
    ]
}

#[test]
fn missing_target_is_recreated_once() {
    let store = Arc::new(ScriptedStore::empty());
    let log = CallLog::new();
    let reconciler = reconciler_for(&store, dependents(&log));

    assert_eq!(reconciler.sync(TARGET).unwrap(), SyncOutcome::Recreated);

    let created = store.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name(), TARGET);
    assert_eq!(created[0].spec, PolicySpec::strict());
    assert!(log.is_empty());
}

#[test]
fn recreate_failure_is_transient() {
    let store = Arc::new(ScriptedStore::empty());
    store.fail_creates(Some(StoreError::unavailable("apiserver timeout")));
    let reconciler = reconciler_for(&store, Vec::new());

    let err = reconciler.sync(TARGET).unwrap_err();
    assert!(matches!(err, ControllerError::Store(_)));
    assert!(err.is_retryable());
    assert_eq!(store.create_attempts(), 1);
    assert_eq!(store.create_count(), 0);

    // The retry issues exactly one more create and it lands.
    store.fail_creates(None);
    assert_eq!(reconciler.sync(TARGET).unwrap(), SyncOutcome::Recreated);
    assert_eq!(store.create_attempts(), 2);
    assert_eq!(store.create_count(), 1);
}

#[test]
fn other_keys_touch_nothing() {
    let store = Arc::new(ScriptedStore::empty());
    let log = CallLog::new();
    let reconciler = reconciler_for(&store, dependents(&log));

    assert_eq!(reconciler.sync("other").unwrap(), SyncOutcome::Ignored);
    assert_eq!(store.get_count(), 0);
    assert_eq!(store.create_attempts(), 0);
    assert!(log.is_empty());
}

#[test]
fn drift_updates_dependents_in_order() {
    let store = Arc::new(ScriptedStore::with_object(policy_config(
        TARGET,
        PolicySpec::relaxed(),
    )));
    let log = CallLog::new();
    let reconciler = reconciler_for(&store, dependents(&log));

    assert_eq!(reconciler.sync(TARGET).unwrap(), SyncOutcome::Converged);

    assert_eq!(log.names(), vec!["pods", "network", "admission"]);
    assert!(log
        .calls()
        .iter()
        .all(|(_, config)| config.spec == PolicySpec::relaxed()));
    assert_eq!(reconciler.desired().spec, PolicySpec::relaxed());
    assert_eq!(store.create_count(), 0);
}

#[test]
fn failing_dependent_stops_propagation() {
    let store = Arc::new(ScriptedStore::with_object(policy_config(
        TARGET,
        PolicySpec::relaxed(),
    )));
    let log = CallLog::new();
    let deps = dependents(&log);
    deps[1].fail_always();
    let reconciler = reconciler_for(&store, deps.clone());

    let err = reconciler.sync(TARGET).unwrap_err();
    assert!(matches!(err, ControllerError::Dependent { ref dependent, .. } if dependent == "network"));
    assert_eq!(log.names(), vec!["pods", "network"]);

    // No rollback: the observed config is already the applied one.
    assert_eq!(reconciler.desired().spec, PolicySpec::relaxed());

    // The retry re-applies to every dependent.
    deps[1].succeed();
    log.clear();
    assert_eq!(reconciler.sync(TARGET).unwrap(), SyncOutcome::Converged);
    assert_eq!(log.names(), vec!["pods", "network", "admission"]);
}

#[test]
fn unchanged_config_is_idempotent() {
    let store = Arc::new(ScriptedStore::with_object(policy_config(
        TARGET,
        PolicySpec::strict(),
    )));
    let log = CallLog::new();
    let reconciler = reconciler_for(&store, dependents(&log));

    for _ in 0..3 {
        assert_eq!(reconciler.sync(TARGET).unwrap(), SyncOutcome::InSync);
    }
    assert!(log.is_empty());
    assert_eq!(store.create_count(), 0);
}

#[test]
fn metadata_changes_alone_are_not_drift() {
    let mut observed = policy_config(TARGET, PolicySpec::strict());
    observed.meta.resource_version = 42;
    observed.meta.namespace = Some("kube-system".into());
    let store = Arc::new(ScriptedStore::with_object(observed));
    let log = CallLog::new();
    let reconciler = reconciler_for(&store, dependents(&log));

    assert_eq!(reconciler.sync(TARGET).unwrap(), SyncOutcome::InSync);
    assert!(log.is_empty());
}

#[test]
fn lookup_failure_is_transient() {
    let store = Arc::new(ScriptedStore::empty());
    store.fail_gets(Some(StoreError::unavailable("cache not ready")));
    let reconciler = reconciler_for(&store, Vec::new());

    let err = reconciler.sync(TARGET).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(store.create_count(), 0);
}
