//! CLI command implementations.

pub mod policy;
pub mod run;
pub mod validate;
