//! # Steady Core
//!
//! Level-triggered reconciliation of a single, named configuration object.
//!
//! This crate provides:
//! - Configuration resource model and object keys
//! - Store seams (cached lister, create client) and an in-memory store
//! - Change notification adapter feeding a rate-limited work queue
//! - Reconciler that recreates, adopts or ignores observed state
//! - Ordered propagation to dependent controllers
//! - Worker pool with graceful shutdown
//!
//! ## Architecture
//!
//! ```text
//! ChangeSource -> EnqueueHandler -> RateLimitingQueue -> workers
//!                                         ^                 |
//!                                         |        ConfigReconciler::sync
//!                                         |          /            \
//!                                    add_rate_limited    Propagator | ConfigClient::create
//! ```
//!
//! ## Key Invariants
//!
//! - A key is processed by at most one worker at a time
//! - Reconciliation only compares observed state with applied state; the
//!   triggering event is never inspected
//! - Transient failures are retried with per-key exponential backoff
//! - Dependents are updated in registration order, stopping at the first
//!   failure
//! - No worker picks up a new key after shutdown begins

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod controller;
mod desired;
mod error;
mod memory;
mod notifier;
mod propagator;
mod reconciler;
mod resource;
mod shutdown;
mod store;

pub use config::ControllerConfig;
pub use controller::Controller;
pub use desired::DesiredState;
pub use error::{ControllerError, ControllerResult};
pub use memory::MemoryConfigStore;
pub use notifier::{ChangeSource, EnqueueHandler, ResourceEventHandler};
pub use propagator::{Dependent, DependentError, Propagator};
pub use reconciler::{ConfigReconciler, SyncOutcome};
pub use resource::{ConfigResource, ConfigSpec, ObjectKey, ObjectMeta};
pub use shutdown::StopSignal;
pub use store::{ConfigClient, ConfigLister, StoreError, StoreResult};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
