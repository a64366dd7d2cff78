//! Shared helpers for the steady benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Returns `count` distinct namespaced keys.
pub fn keys(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("tenant-{}/config-{i}", i % 8))
        .collect()
}
