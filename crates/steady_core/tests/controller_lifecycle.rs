//! Worker pool, retry and shutdown behavior.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use steady_core::{
    ConfigClient, ConfigReconciler, Controller, ControllerError, Dependent, MemoryConfigStore,
    Propagator, StopSignal,
};
use steady_testkit::prelude::*;

fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let until = Instant::now() + deadline;
    while Instant::now() < until {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    done()
}

fn memory_controller(
    store: &Arc<MemoryConfigStore<PolicySpec>>,
    dependents: Vec<Arc<RecordingDependent<PolicySpec>>>,
) -> Arc<Controller<PolicySpec>> {
    let dependents = dependents
        .into_iter()
        .map(|d| d as Arc<dyn Dependent<PolicySpec>>)
        .collect();
    let reconciler = ConfigReconciler::new(
        Some(TARGET.to_string()),
        policy_config(TARGET, PolicySpec::strict()),
        store.clone(),
        store.clone(),
        Propagator::new(dependents),
    );
    Arc::new(Controller::new(fast_controller_config(), reconciler, store.clone()).unwrap())
}

#[test]
fn retry_delay_grows_then_resets() {
    let store = Arc::new(ScriptedStore::with_object(policy_config(
        TARGET,
        PolicySpec::relaxed(),
    )));
    let log = CallLog::new();
    let dependent = RecordingDependent::new("pods", &log);
    dependent.fail_times(3);
    let source = Arc::new(StaticChangeSource::<PolicySpec>::new(true));
    let controller =
        Controller::new(fast_controller_config(), reconciler_for(&store, vec![dependent]), source)
            .unwrap();
    let key = TARGET.to_string();

    controller.queue().add(key.clone());
    assert!(controller.process_next_item());

    let mut gaps = Vec::new();
    for expected in 2..=3 {
        let start = Instant::now();
        assert!(controller.process_next_item());
        gaps.push(start.elapsed());
        assert_eq!(controller.queue().num_requeues(&key), expected);
    }
    assert!(gaps[0] >= Duration::from_millis(5));
    assert!(gaps[1] >= Duration::from_millis(10));

    // Fourth attempt succeeds and the backoff history is cleared.
    assert!(controller.process_next_item());
    assert_eq!(controller.queue().num_requeues(&key), 0);
    assert_eq!(log.len(), 4);

    let stats = controller.queue().stats();
    assert_eq!(stats.rate_limited(), 3);
    assert!(stats.forgets() >= 1);
}

#[test]
fn notifier_events_drive_reconciliation() {
    let store = Arc::new(ScriptedStore::with_object(policy_config(
        TARGET,
        PolicySpec::strict(),
    )));
    let log = CallLog::new();
    let source = Arc::new(StaticChangeSource::<PolicySpec>::new(true));
    let controller = Controller::new(
        fast_controller_config(),
        reconciler_for(&store, vec![RecordingDependent::new("pods", &log)]),
        source.clone(),
    )
    .unwrap();
    assert_eq!(source.handler_count(), 1);

    let old = policy_config(TARGET, PolicySpec::strict());
    let mut new = policy_config(TARGET, PolicySpec::relaxed());
    new.meta.resource_version = 2;

    source.emit_update(&old, &old);
    assert!(controller.queue().is_empty());

    store.set_object(Some(new.clone()));
    source.emit_update(&old, &new);
    assert!(controller.process_next_item());
    assert_eq!(log.names(), vec!["pods"]);
}

#[test]
fn deleted_config_is_recreated_by_workers() {
    let store = Arc::new(MemoryConfigStore::<PolicySpec>::new());
    store
        .create(&policy_config(TARGET, PolicySpec::strict()))
        .unwrap();
    let controller = memory_controller(&store, Vec::new());
    let stop = StopSignal::new();

    let runner = {
        let controller = Arc::clone(&controller);
        let stop = stop.clone();
        thread::spawn(move || controller.run(3, &stop))
    };

    store.delete(TARGET).unwrap();
    assert!(wait_for(Duration::from_secs(5), || !store.is_empty()));

    stop.trigger();
    runner.join().unwrap().unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn drift_in_store_reaches_dependents() {
    let store = Arc::new(MemoryConfigStore::<PolicySpec>::new());
    store
        .create(&policy_config(TARGET, PolicySpec::strict()))
        .unwrap();
    let log = CallLog::new();
    let controller = memory_controller(
        &store,
        vec![
            RecordingDependent::new("pods", &log),
            RecordingDependent::new("network", &log),
        ],
    );
    let stop = StopSignal::new();
    let runner = {
        let controller = Arc::clone(&controller);
        let stop = stop.clone();
        thread::spawn(move || controller.run(2, &stop))
    };

    store
        .update(&policy_config(TARGET, PolicySpec::relaxed()))
        .unwrap();
    assert!(wait_for(Duration::from_secs(5), || log.len() == 2));

    stop.trigger();
    runner.join().unwrap().unwrap();
    assert_eq!(log.names(), vec!["pods", "network"]);
    assert_eq!(controller.reconciler().desired().spec, PolicySpec::relaxed());
}

#[test]
fn shutdown_lets_in_flight_work_finish() {
    struct Slow {
        inner: Arc<RecordingDependent<PolicySpec>>,
    }

    impl Dependent<PolicySpec> for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn update_config(
            &self,
            config: &steady_core::ConfigResource<PolicySpec>,
        ) -> Result<(), steady_core::DependentError> {
            thread::sleep(Duration::from_millis(100));
            self.inner.update_config(config)
        }
    }

    let store = Arc::new(MemoryConfigStore::<PolicySpec>::new());
    store
        .create(&policy_config(TARGET, PolicySpec::strict()))
        .unwrap();
    let log = CallLog::new();
    let reconciler = ConfigReconciler::new(
        Some(TARGET.to_string()),
        policy_config(TARGET, PolicySpec::strict()),
        store.clone(),
        store.clone(),
        Propagator::new(vec![Arc::new(Slow {
            inner: RecordingDependent::new("slow", &log),
        }) as Arc<dyn Dependent<PolicySpec>>]),
    );
    let controller =
        Arc::new(Controller::new(fast_controller_config(), reconciler, store.clone()).unwrap());
    let stop = StopSignal::new();
    let runner = {
        let controller = Arc::clone(&controller);
        let stop = stop.clone();
        thread::spawn(move || controller.run(1, &stop))
    };

    let forgets_before = controller.queue().stats().forgets();
    store
        .update(&policy_config(TARGET, PolicySpec::relaxed()))
        .unwrap();
    assert!(wait_for(Duration::from_secs(5), || controller.queue().in_flight() == 1));
    stop.trigger();
    runner.join().unwrap().unwrap();

    // The item that was being processed completed before run returned, and
    // its success cleared the retry history.
    assert_eq!(log.len(), 1);
    assert_eq!(controller.queue().in_flight(), 0);
    assert_eq!(controller.queue().num_requeues(&TARGET.to_string()), 0);
    assert_eq!(controller.queue().stats().forgets(), forgets_before + 1);

    // Nothing is admitted after shutdown.
    controller.queue().add(TARGET.to_string());
    assert!(!controller.process_next_item());
}

#[test]
fn unsynced_source_fails_run() {
    let store = Arc::new(ScriptedStore::empty());
    let source = Arc::new(StaticChangeSource::<PolicySpec>::new(false));
    let config = fast_controller_config().with_cache_sync_timeout(Duration::from_millis(30));
    let controller = Controller::new(config, reconciler_for(&store, Vec::new()), source).unwrap();

    let err = controller.run(2, &StopSignal::new()).unwrap_err();
    assert!(matches!(err, ControllerError::CacheSyncFailed { .. }));
    assert!(!err.is_retryable());
    assert_eq!(store.get_count(), 0);
}

#[test]
fn late_sync_admits_work() {
    let store = Arc::new(ScriptedStore::empty());
    let source = Arc::new(StaticChangeSource::<PolicySpec>::new(false));
    let controller = Arc::new(
        Controller::new(
            fast_controller_config(),
            reconciler_for(&store, Vec::new()),
            source.clone(),
        )
        .unwrap(),
    );
    controller.queue().add(TARGET.to_string());
    let stop = StopSignal::new();
    let runner = {
        let controller = Arc::clone(&controller);
        let stop = stop.clone();
        thread::spawn(move || controller.run(1, &stop))
    };

    thread::sleep(Duration::from_millis(30));
    assert_eq!(store.get_count(), 0);

    source.set_synced(true);
    assert!(wait_for(Duration::from_secs(5), || store.create_count() == 1));
    stop.trigger();
    runner.join().unwrap().unwrap();
}
