//! # Steady Testkit
//!
//! Test utilities for the steady controller.
//!
//! This crate provides:
//! - Scripted store, recording dependents and a manual change source
//! - Sample configuration payloads and config file fixtures
//! - Property-based test generators using proptest
//! - Queue stress harness
//!
//! ## Usage
//!
//! ```rust,ignore
//! use steady_testkit::prelude::*;
//!
//! #[test]
//! fn drift_reaches_dependents() {
//!     let store = Arc::new(ScriptedStore::with_object(policy_config("global", PolicySpec::strict())));
//!     let log = CallLog::new();
//!     let reconciler = reconciler_for(&store, vec![RecordingDependent::new("pods", &log)]);
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::mocks::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use mocks::*;
pub use stress::*;
