//! Structural validation of the proxy input.
//!
//! Normalization is the only stage allowed to reject a run outright: every
//! later stage may assume ids are unique and non-empty, flows are labeled
//! consistently, and dependency edges resolve. A proxy with zero policies is
//! valid and yields an empty disposition set.

use crate::error::MigrationError;
use gatewright_model::{PolicyDescriptor, PolicyFlow, ProxyModel};
use std::collections::HashSet;
use tracing::debug;

/// Check a proxy for structural defects before the pipeline touches it.
///
/// # Errors
/// Returns [`MigrationError::InputMalformed`] naming the first offending
/// policy and field: empty ids, duplicate ids across the whole proxy,
/// flow or phase labels that contradict the owning flow, and `depends_on`
/// edges pointing at unknown policies or at the policy itself.
pub fn validate_proxy(proxy: &ProxyModel) -> Result<(), MigrationError> {
    let mut seen = HashSet::new();
    for flow in &proxy.flows {
        for policy in &flow.policies {
            check_identity(flow, policy)?;
            if !seen.insert(policy.id.clone()) {
                return Err(malformed(policy, "id", "duplicate policy id"));
            }
        }
    }

    for flow in &proxy.flows {
        for policy in &flow.policies {
            for dependency in &policy.depends_on {
                if dependency == &policy.id {
                    return Err(malformed(policy, "depends_on", "policy depends on itself"));
                }
                if !seen.contains(dependency) {
                    return Err(malformed(
                        policy,
                        "depends_on",
                        &format!("references unknown policy '{dependency}'"),
                    ));
                }
            }
        }
    }

    debug!(
        proxy = %proxy.name,
        policies = proxy.policy_count(),
        flows = proxy.flows.len(),
        "proxy input validated"
    );
    Ok(())
}

fn check_identity(flow: &PolicyFlow, policy: &PolicyDescriptor) -> Result<(), MigrationError> {
    if policy.id.is_empty() {
        return Err(malformed(policy, "id", "policy id is empty"));
    }
    if policy.flow_name != flow.name {
        return Err(malformed(
            policy,
            "flow_name",
            &format!("labeled '{}' but owned by flow '{}'", policy.flow_name, flow.name),
        ));
    }
    if policy.phase != flow.phase {
        return Err(malformed(
            policy,
            "phase",
            &format!("labeled '{}' but owned by a '{}' flow", policy.phase, flow.phase),
        ));
    }
    Ok(())
}

fn malformed(policy: &PolicyDescriptor, field: &str, reason: &str) -> MigrationError {
    MigrationError::InputMalformed {
        policy_id: policy.id.clone(),
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}
