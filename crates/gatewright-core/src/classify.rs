//! Per-policy classification.
//!
//! Walks the proxy in flow order and assigns exactly one [`Disposition`]
//! per policy. The decision ladder, first match wins:
//!
//! 1. type unknown to the table → `Custom`, confidence zero;
//! 2. type in the native set → `NotRequired`;
//! 3. table row demands extension code → `Custom`;
//! 4. policy sits in a bundle → `Bundled`, confidence is the weakest
//!    member's direct score;
//! 5. otherwise → `Direct`, baseline or advisory-supplied confidence.
//!
//! Advisory confidences are untrusted and clamped into range; clamping is
//! logged at WARN and never fails the run.

use crate::error::MigrationError;
use gatewright_bundling::BundlePlan;
use gatewright_gensvc::derive_plugin_name;
use gatewright_mapping::{MappingTable, TableHit, TargetMapping};
use gatewright_model::{
    BundlingAdvice, Confidence, Disposition, PolicyDescriptor, PolicyId, ProxyModel,
};
use tracing::{debug, warn};

/// The classification stage's output.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// One verdict per input policy, in flow order.
    pub dispositions: Vec<Disposition>,
    /// Non-fatal notes raised along the way (unknown types).
    pub notes: Vec<MigrationError>,
}

/// Classify every policy of a proxy against the table and bundle plan.
#[must_use]
pub fn classify_proxy(
    proxy: &ProxyModel,
    table: &MappingTable,
    plan: &BundlePlan,
    advice: &BundlingAdvice,
    direct_baseline: Confidence,
) -> Classification {
    let mut out = Classification::default();
    for flow in &proxy.flows {
        for policy in flow.ordered() {
            let disposition = classify_one(policy, table, plan, advice, direct_baseline, &mut out);
            debug!(
                policy = %policy.id,
                kind = %disposition.kind,
                confidence = %disposition.confidence,
                "classified"
            );
            out.dispositions.push(disposition);
        }
    }
    out
}

fn classify_one(
    policy: &PolicyDescriptor,
    table: &MappingTable,
    plan: &BundlePlan,
    advice: &BundlingAdvice,
    baseline: Confidence,
    out: &mut Classification,
) -> Disposition {
    let mapping = match table.hit(&policy.policy_type) {
        TableHit::Unknown => {
            out.notes.push(MigrationError::UnknownPolicyType {
                policy_id: policy.id.clone(),
                type_name: policy.policy_type.as_str().to_owned(),
            });
            return Disposition::custom(
                policy.id.clone(),
                derive_plugin_name(policy.id.as_str()),
                Confidence::ZERO,
                format!("unrecognized policy type '{}'", policy.policy_type),
            );
        }
        TableHit::Native(reason) => {
            return Disposition::not_required(policy.id.clone(), reason);
        }
        TableHit::Mapped(mapping) => mapping,
    };

    if mapping.requires_custom {
        // The table knows the target shape; the code does not exist yet.
        return Disposition::custom(
            policy.id.clone(),
            derive_plugin_name(policy.id.as_str()),
            Confidence::clamped(0.5),
            custom_rationale(mapping),
        );
    }

    if let Some(bundle_id) = plan.bundle_for(&policy.id) {
        if let Some(bundle) = plan.bundle(bundle_id) {
            let confidence = bundle
                .member_policy_ids()
                .iter()
                .map(|member| direct_score(member, advice, baseline))
                .fold(Confidence::FULL, Confidence::min);
            return Disposition::bundled(
                policy.id.clone(),
                bundle.target_construct(),
                bundle_id,
                confidence,
                bundle.rationale(),
            );
        }
    }

    let confidence = direct_score(&policy.id, advice, baseline);
    Disposition::direct(
        policy.id.clone(),
        mapping.target_construct.clone(),
        confidence,
        direct_rationale(mapping),
    )
}

fn direct_score(policy_id: &PolicyId, advice: &BundlingAdvice, baseline: Confidence) -> Confidence {
    match advice.confidences.get(policy_id) {
        Some(&raw) => {
            let clamped = Confidence::clamped(raw);
            if raw.is_nan() || !(0.0..=1.0).contains(&raw) {
                warn!(policy = %policy_id, raw, clamped = %clamped, "advisory confidence clamped");
            }
            clamped
        }
        None => baseline,
    }
}

fn direct_rationale(mapping: &TargetMapping) -> String {
    let mut rationale = format!("maps directly to '{}'", mapping.target_construct);
    if let Some(notes) = &mapping.notes {
        rationale.push_str("; ");
        rationale.push_str(notes);
    }
    rationale
}

fn custom_rationale(mapping: &TargetMapping) -> String {
    let mut rationale = format!(
        "no native equivalent; extension code required ({} effort)",
        mapping.base_effort
    );
    if let Some(notes) = &mapping.notes {
        rationale.push_str("; ");
        rationale.push_str(notes);
    }
    rationale
}
