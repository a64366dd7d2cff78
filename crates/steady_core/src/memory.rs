//! In-memory configuration store.
//!
//! [`MemoryConfigStore`] implements every store seam at once: it is the
//! lister, the client and the change source. It assigns resource versions
//! and UIDs the way a real API server would and notifies registered
//! handlers synchronously after each write.

use crate::notifier::{ChangeSource, ResourceEventHandler};
use crate::resource::ConfigResource;
use crate::store::{ConfigClient, ConfigLister, StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Thread-safe in-memory store for configuration objects, keyed by name.
pub struct MemoryConfigStore<S> {
    objects: RwLock<HashMap<String, ConfigResource<S>>>,
    handlers: RwLock<Vec<Arc<dyn ResourceEventHandler<S>>>>,
    last_version: AtomicU64,
    synced: AtomicBool,
}

impl<S: Clone + Send + Sync> MemoryConfigStore<S> {
    /// Creates an empty store that reports itself as synced.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            handlers: RwLock::new(Vec::new()),
            last_version: AtomicU64::new(0),
            synced: AtomicBool::new(true),
        }
    }

    /// Creates an empty store that stays unsynced until
    /// [`mark_synced`](Self::mark_synced) is called.
    pub fn unsynced() -> Self {
        let store = Self::new();
        store.synced.store(false, Ordering::SeqCst);
        store
    }

    /// Marks the initial listing as loaded.
    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::SeqCst);
    }

    /// Replaces an existing object and notifies handlers of the update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no object with that name exists.
    pub fn update(&self, config: &ConfigResource<S>) -> StoreResult<ConfigResource<S>> {
        let (old, new) = {
            let mut objects = self.objects.write();
            let Some(current) = objects.get_mut(config.name()) else {
                return Err(StoreError::not_found(config.name()));
            };
            let mut next = config.clone();
            next.meta.uid = current.meta.uid;
            next.meta.resource_version = self.next_version();
            let old = std::mem::replace(current, next.clone());
            (old, next)
        };

        debug!(name = %new.meta.name, version = new.meta.resource_version, "updated configuration");
        for handler in self.handlers_snapshot() {
            handler.on_update(&old, &new);
        }
        Ok(new)
    }

    /// Removes an object and notifies handlers of the deletion.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no object with that name exists.
    pub fn delete(&self, name: &str) -> StoreResult<ConfigResource<S>> {
        let removed = self
            .objects
            .write()
            .remove(name)
            .ok_or_else(|| StoreError::not_found(name))?;

        debug!(name, "deleted configuration");
        for handler in self.handlers_snapshot() {
            handler.on_delete(&removed);
        }
        Ok(removed)
    }

    /// Redelivers every object as an update with an unchanged version.
    pub fn resync(&self) {
        let objects: Vec<_> = self.objects.read().values().cloned().collect();
        let handlers = self.handlers_snapshot();
        for obj in &objects {
            for handler in &handlers {
                handler.on_update(obj, obj);
            }
        }
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn next_version(&self) -> u64 {
        self.last_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn handlers_snapshot(&self) -> Vec<Arc<dyn ResourceEventHandler<S>>> {
        self.handlers.read().clone()
    }
}

impl<S: Clone + Send + Sync> Default for MemoryConfigStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Send + Sync> ConfigLister<S> for MemoryConfigStore<S> {
    fn get(&self, name: &str) -> StoreResult<ConfigResource<S>> {
        self.objects
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(name))
    }
}

impl<S: Clone + Send + Sync> ConfigClient<S> for MemoryConfigStore<S> {
    fn create(&self, config: &ConfigResource<S>) -> StoreResult<ConfigResource<S>> {
        let created = {
            let mut objects = self.objects.write();
            if objects.contains_key(config.name()) {
                return Err(StoreError::already_exists(config.name()));
            }
            let mut created = config.clone();
            created.meta.resource_version = self.next_version();
            created.meta.uid = Some(Uuid::new_v4());
            objects.insert(created.meta.name.clone(), created.clone());
            created
        };

        debug!(name = %created.meta.name, version = created.meta.resource_version, "created configuration");
        for handler in self.handlers_snapshot() {
            handler.on_add(&created);
        }
        Ok(created)
    }
}

impl<S: Clone + Send + Sync> ChangeSource<S> for MemoryConfigStore<S> {
    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler<S>>) {
        self.handlers.write().push(handler);
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}

impl<S> std::fmt::Debug for MemoryConfigStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfigStore")
            .field("objects", &self.objects.read().len())
            .field("handlers", &self.handlers.read().len())
            .field("synced", &self.synced.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl ResourceEventHandler<u32> for Events {
        fn on_add(&self, obj: &ConfigResource<u32>) {
            self.0.lock().push(format!("add {}", obj.name()));
        }
        fn on_update(&self, old: &ConfigResource<u32>, new: &ConfigResource<u32>) {
            self.0.lock().push(format!(
                "update {} {}->{}",
                new.name(),
                old.meta.resource_version,
                new.meta.resource_version
            ));
        }
        fn on_delete(&self, obj: &ConfigResource<u32>) {
            self.0.lock().push(format!("delete {}", obj.name()));
        }
    }

    #[test]
    fn create_assigns_version_and_uid() {
        let store = MemoryConfigStore::new();
        let created = store.create(&ConfigResource::new("global", 1u32)).unwrap();

        assert_eq!(created.meta.resource_version, 1);
        assert!(created.meta.uid.is_some());
        assert_eq!(store.get("global").unwrap(), created);
    }

    #[test]
    fn create_rejects_duplicates() {
        let store = MemoryConfigStore::new();
        store.create(&ConfigResource::new("global", 1u32)).unwrap();
        let err = store.create(&ConfigResource::new("global", 2u32)).unwrap_err();
        assert_eq!(err, StoreError::already_exists("global"));
    }

    #[test]
    fn update_keeps_uid_and_bumps_version() {
        let store = MemoryConfigStore::new();
        let created = store.create(&ConfigResource::new("global", 1u32)).unwrap();
        let updated = store.update(&ConfigResource::new("global", 2u32)).unwrap();

        assert_eq!(updated.meta.uid, created.meta.uid);
        assert!(updated.meta.resource_version > created.meta.resource_version);
        assert_eq!(store.get("global").unwrap().spec, 2);
    }

    #[test]
    fn missing_objects() {
        let store = MemoryConfigStore::<u32>::new();
        assert!(store.get("global").unwrap_err().is_not_found());
        assert!(store.update(&ConfigResource::new("global", 1)).is_err());
        assert!(store.delete("global").is_err());
    }

    #[test]
    fn handlers_see_every_write() {
        let store = MemoryConfigStore::new();
        let events = Arc::new(Events::default());
        store.add_event_handler(events.clone());

        store.create(&ConfigResource::new("global", 1u32)).unwrap();
        store.update(&ConfigResource::new("global", 2u32)).unwrap();
        store.resync();
        store.delete("global").unwrap();

        assert_eq!(
            *events.0.lock(),
            vec![
                "add global".to_string(),
                "update global 1->2".to_string(),
                "update global 2->2".to_string(),
                "delete global".to_string(),
            ]
        );
        assert!(store.is_empty());
    }

    #[test]
    fn sync_flag() {
        let store = MemoryConfigStore::<u32>::unsynced();
        assert!(!store.has_synced());
        store.mark_synced();
        assert!(store.has_synced());
    }
}
