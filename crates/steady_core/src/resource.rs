//! The configuration resource and its object keys.

use crate::error::{ControllerError, ControllerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Bounds required of a configuration payload.
///
/// Equality on the payload is what decides whether an observed resource
/// differs from the applied one; metadata is never compared.
pub trait ConfigSpec: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T> ConfigSpec for T where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

/// Identity and versioning fields maintained by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object name, unique within its namespace.
    pub name: String,
    /// Namespace, or `None` for cluster-scoped objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Bumped by the store on every write. Resyncs redeliver the same value.
    #[serde(default)]
    pub resource_version: u64,
    /// Assigned by the store on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
}

impl ObjectMeta {
    /// Metadata for a cluster-scoped object with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A configuration object: store metadata plus a typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigResource<S> {
    /// Store metadata.
    pub meta: ObjectMeta,
    /// The configuration payload.
    pub spec: S,
}

impl<S> ConfigResource<S> {
    /// Creates a cluster-scoped resource with empty store metadata.
    pub fn new(name: impl Into<String>, spec: S) -> Self {
        Self {
            meta: ObjectMeta::named(name),
            spec,
        }
    }

    /// Returns the object name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Returns the queue key for this object.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::for_meta(&self.meta)
    }

    /// Copy suitable for a create call: server-assigned fields cleared.
    pub fn for_create(&self) -> Self
    where
        S: Clone,
    {
        Self {
            meta: ObjectMeta {
                resource_version: 0,
                uid: None,
                ..self.meta.clone()
            },
            spec: self.spec.clone(),
        }
    }
}

impl<S: PartialEq> ConfigResource<S> {
    /// Returns true if both resources carry an equal payload.
    pub fn same_spec(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

/// Queue key of an object: `namespace/name`, or just `name` when
/// cluster-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Namespace, if any.
    pub namespace: Option<String>,
    /// Object name.
    pub name: String,
}

impl ObjectKey {
    /// Builds the key for an object's metadata.
    pub fn for_meta(meta: &ObjectMeta) -> Self {
        Self {
            namespace: meta.namespace.clone().filter(|ns| !ns.is_empty()),
            name: meta.name.clone(),
        }
    }

    /// Splits a queue key into namespace and name.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidKey`] if the key has more than one
    /// `/` or an empty name.
    pub fn parse(key: &str) -> ControllerResult<Self> {
        let mut parts = key.split('/');
        let (namespace, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => (None, name),
            (Some(ns), Some(name), None) => ((!ns.is_empty()).then(|| ns.to_string()), name),
            _ => return Err(ControllerError::invalid_key(key, "unexpected key format")),
        };
        if name.is_empty() {
            return Err(ControllerError::invalid_key(key, "empty name"));
        }
        Ok(Self {
            namespace,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}
