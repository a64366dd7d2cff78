//! Change notifications and the adapter that turns them into queue keys.

use crate::resource::ConfigResource;
use std::marker::PhantomData;
use std::sync::Arc;
use steady_queue::RateLimitingQueue;
use tracing::{debug, error, trace};

/// Callbacks invoked by a [`ChangeSource`] when objects change.
///
/// All methods default to doing nothing.
pub trait ResourceEventHandler<S>: Send + Sync {
    /// An object was added.
    fn on_add(&self, _obj: &ConfigResource<S>) {}

    /// An object was updated. Periodic resyncs deliver `old == new` with an
    /// unchanged resource version.
    fn on_update(&self, _old: &ConfigResource<S>, _new: &ConfigResource<S>) {}

    /// An object was deleted. `obj` is the last state seen.
    fn on_delete(&self, _obj: &ConfigResource<S>) {}
}

/// A cached watch on configuration objects.
pub trait ChangeSource<S>: Send + Sync {
    /// Registers a handler for future notifications.
    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler<S>>);

    /// Returns true once the initial listing has been loaded.
    fn has_synced(&self) -> bool;
}

/// Enqueues the key of every updated or deleted configuration object.
///
/// Adds are not enqueued: the controller starts from an already applied
/// configuration and only reacts to subsequent changes. Updates that carry
/// the same resource version as the previous state are resyncs and are
/// skipped.
pub struct EnqueueHandler<S> {
    queue: Arc<RateLimitingQueue<String>>,
    _spec: PhantomData<fn(&S)>,
}

impl<S> EnqueueHandler<S> {
    /// Creates a handler feeding `queue`.
    pub fn new(queue: Arc<RateLimitingQueue<String>>) -> Self {
        Self {
            queue,
            _spec: PhantomData,
        }
    }

    fn enqueue(&self, obj: &ConfigResource<S>, event: &str) {
        if obj.meta.name.is_empty() {
            error!(event, "cannot derive key for object without a name");
            return;
        }
        let key = obj.key().to_string();
        debug!(%key, event, "enqueueing configuration");
        self.queue.add(key);
    }
}

impl<S> ResourceEventHandler<S> for EnqueueHandler<S> {
    fn on_update(&self, old: &ConfigResource<S>, new: &ConfigResource<S>) {
        if old.meta.resource_version == new.meta.resource_version {
            trace!(name = %new.meta.name, "ignoring resync");
            return;
        }
        self.enqueue(new, "update");
    }

    fn on_delete(&self, obj: &ConfigResource<S>) {
        self.enqueue(obj, "delete");
    }
}

impl<S> std::fmt::Debug for EnqueueHandler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnqueueHandler")
            .field("queue", &self.queue.name())
            .finish()
    }
}
