//! Property-based test generators using proptest.

use crate::fixtures::PolicySpec;
use proptest::prelude::*;

/// Strategy for generating object names.
pub fn object_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating queue keys, with or without a namespace.
pub fn object_key_strategy() -> impl Strategy<Value = String> {
    (
        prop::option::of(object_name_strategy()),
        object_name_strategy(),
    )
        .prop_map(|(namespace, name)| match namespace {
            Some(ns) => format!("{ns}/{name}"),
            None => name,
        })
}

/// Strategy for generating policy payloads.
pub fn policy_spec_strategy() -> impl Strategy<Value = PolicySpec> {
    (
        any::<bool>(),
        prop::sample::select(vec!["change-default", "change-all", "forbidden"]),
        prop::sample::select(vec!["runtime/default", "unconfined", "localhost/strict"]),
        prop::sample::select(vec!["deny-all", "allow-all", "deny-egress"]),
        prop::sample::select(vec!["nobody", "none", "restricted"]),
    )
        .prop_map(|(enforcement, automount, seccomp, network, context)| PolicySpec {
            enforcement,
            automount_service_account_token: automount.to_string(),
            seccomp_profile: seccomp.to_string(),
            network_policy: network.to_string(),
            pod_security_context: context.to_string(),
        })
}
