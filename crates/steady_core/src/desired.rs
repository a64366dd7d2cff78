//! The configuration currently applied by the controller.

use crate::resource::ConfigResource;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared holder of the last applied configuration.
///
/// Readers take a cheap [`Arc`] snapshot; a reconcile swaps in a new value
/// before pushing it to dependents.
#[derive(Debug)]
pub struct DesiredState<S> {
    current: RwLock<Arc<ConfigResource<S>>>,
}

impl<S> DesiredState<S> {
    /// Starts from `initial`.
    pub fn new(initial: ConfigResource<S>) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Returns the current configuration.
    pub fn snapshot(&self) -> Arc<ConfigResource<S>> {
        Arc::clone(&self.current.read())
    }

    /// Replaces the current configuration, returning the previous one.
    pub fn replace(&self, next: Arc<ConfigResource<S>>) -> Arc<ConfigResource<S>> {
        std::mem::replace(&mut *self.current.write(), next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_survives_replace() {
        let state = DesiredState::new(ConfigResource::new("global", 1u32));
        let before = state.snapshot();

        let previous = state.replace(Arc::new(ConfigResource::new("global", 2u32)));

        assert_eq!(previous.spec, 1);
        assert_eq!(before.spec, 1);
        assert_eq!(state.snapshot().spec, 2);
    }
}
