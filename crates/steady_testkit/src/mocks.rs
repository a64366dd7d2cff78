//! Test doubles for the store, dependents and change source.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use steady_core::{
    ChangeSource, ConfigClient, ConfigLister, ConfigResource, Dependent, DependentError,
    ResourceEventHandler, StoreError, StoreResult,
};

/// A store whose answers are set by the test.
///
/// `get` returns the scripted object, [`StoreError::NotFound`] when there is
/// none, or the scripted failure. `create` records what it was given and
/// never changes the scripted object.
pub struct ScriptedStore<S> {
    object: Mutex<Option<ConfigResource<S>>>,
    get_error: Mutex<Option<StoreError>>,
    create_error: Mutex<Option<StoreError>>,
    created: Mutex<Vec<ConfigResource<S>>>,
    gets: AtomicUsize,
    create_attempts: AtomicUsize,
}

impl<S: Clone> ScriptedStore<S> {
    /// Creates a store that holds nothing.
    pub fn empty() -> Self {
        Self {
            object: Mutex::new(None),
            get_error: Mutex::new(None),
            create_error: Mutex::new(None),
            created: Mutex::new(Vec::new()),
            gets: AtomicUsize::new(0),
            create_attempts: AtomicUsize::new(0),
        }
    }

    /// Creates a store holding `object`.
    pub fn with_object(object: ConfigResource<S>) -> Self {
        let store = Self::empty();
        store.set_object(Some(object));
        store
    }

    /// Replaces the scripted object.
    pub fn set_object(&self, object: Option<ConfigResource<S>>) {
        *self.object.lock() = object;
    }

    /// Makes every `get` fail with `error` until cleared with `None`.
    pub fn fail_gets(&self, error: Option<StoreError>) {
        *self.get_error.lock() = error;
    }

    /// Makes every `create` fail with `error` until cleared with `None`.
    pub fn fail_creates(&self, error: Option<StoreError>) {
        *self.create_error.lock() = error;
    }

    /// Returns every resource passed to a successful `create`.
    pub fn created(&self) -> Vec<ConfigResource<S>> {
        self.created.lock().clone()
    }

    /// Returns the number of `create` calls that succeeded.
    pub fn create_count(&self) -> usize {
        self.created.lock().len()
    }

    /// Returns the number of `create` calls, failed ones included.
    pub fn create_attempts(&self) -> usize {
        self.create_attempts.load(Ordering::SeqCst)
    }

    /// Returns the number of `get` calls.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

impl<S: Clone + Send + Sync> ConfigLister<S> for ScriptedStore<S> {
    fn get(&self, name: &str) -> StoreResult<ConfigResource<S>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.get_error.lock().clone() {
            return Err(err);
        }
        self.object
            .lock()
            .as_ref()
            .filter(|obj| obj.name() == name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(name))
    }
}

impl<S: Clone + Send + Sync> ConfigClient<S> for ScriptedStore<S> {
    fn create(&self, config: &ConfigResource<S>) -> StoreResult<ConfigResource<S>> {
        self.create_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.create_error.lock().clone() {
            return Err(err);
        }
        self.created.lock().push(config.clone());
        Ok(config.clone())
    }
}

/// Calls made to [`RecordingDependent`]s, in the order they happened.
///
/// Share one log between several dependents to observe call order across
/// them.
pub struct CallLog<S> {
    calls: Arc<Mutex<Vec<(String, ConfigResource<S>)>>>,
}

impl<S: Clone> CallLog<S> {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the names of the dependents called, in order.
    pub fn names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Returns every call.
    pub fn calls(&self) -> Vec<(String, ConfigResource<S>)> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns true if nothing was called.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Forgets all calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, name: &str, config: &ConfigResource<S>) {
        self.calls.lock().push((name.to_string(), config.clone()));
    }
}

impl<S: Clone> Default for CallLog<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for CallLog<S> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

/// A dependent that records every configuration it receives.
pub struct RecordingDependent<S> {
    name: String,
    log: CallLog<S>,
    failures_left: AtomicUsize,
    fail_always: AtomicBool,
}

impl<S: Clone> RecordingDependent<S> {
    /// Creates a dependent that always succeeds and records into `log`.
    pub fn new(name: impl Into<String>, log: &CallLog<S>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            log: log.clone(),
            failures_left: AtomicUsize::new(0),
            fail_always: AtomicBool::new(false),
        })
    }

    /// Fails the next `times` calls.
    pub fn fail_times(&self, times: usize) {
        self.failures_left.store(times, Ordering::SeqCst);
    }

    /// Fails every call until [`succeed`](Self::succeed) is called.
    pub fn fail_always(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }

    /// Clears all scripted failures.
    pub fn succeed(&self) {
        self.fail_always.store(false, Ordering::SeqCst);
        self.failures_left.store(0, Ordering::SeqCst);
    }

    fn should_fail(&self) -> bool {
        if self.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl<S: Clone + Send + Sync> Dependent<S> for RecordingDependent<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_config(&self, config: &ConfigResource<S>) -> Result<(), DependentError> {
        self.log.record(&self.name, config);
        if self.should_fail() {
            return Err(DependentError::new(format!("{} rejected configuration", self.name)));
        }
        Ok(())
    }
}

/// A change source driven by hand.
pub struct StaticChangeSource<S> {
    synced: AtomicBool,
    handlers: Mutex<Vec<Arc<dyn ResourceEventHandler<S>>>>,
}

impl<S> StaticChangeSource<S> {
    /// Creates a source with the given synced state.
    pub fn new(synced: bool) -> Self {
        Self {
            synced: AtomicBool::new(synced),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Sets the synced state.
    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::SeqCst);
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Delivers an add to every handler.
    pub fn emit_add(&self, obj: &ConfigResource<S>) {
        for handler in self.handlers() {
            handler.on_add(obj);
        }
    }

    /// Delivers an update to every handler.
    pub fn emit_update(&self, old: &ConfigResource<S>, new: &ConfigResource<S>) {
        for handler in self.handlers() {
            handler.on_update(old, new);
        }
    }

    /// Delivers a delete to every handler.
    pub fn emit_delete(&self, obj: &ConfigResource<S>) {
        for handler in self.handlers() {
            handler.on_delete(obj);
        }
    }

    fn handlers(&self) -> Vec<Arc<dyn ResourceEventHandler<S>>> {
        self.handlers.lock().clone()
    }
}

impl<S: Send + Sync> ChangeSource<S> for StaticChangeSource<S> {
    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler<S>>) {
        self.handlers.lock().push(handler);
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}
