//! Post-run manual reclassification.
//!
//! Operators disagree with verdicts; the engine lets them revise one
//! disposition at a time without re-running analysis. A revision produces a
//! new run value with everything downstream of classification recomputed.
//! Bundles stay immutable: a member of a live bundle cannot be reclassified
//! while its siblings remain bundled.

use crate::engine::{CustomSynthesis, MigrationEngine, MigrationRun};
use crate::error::MigrationError;
use chrono::Utc;
use gatewright_model::{Confidence, Disposition, DispositionKind, PolicyId};
use gatewright_report::SynthesisFailure;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// A requested revision of one policy's migration verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRequest {
    /// Policy to reclassify.
    pub policy_id: PolicyId,
    /// The new kind; `Bundled` is not accepted.
    pub kind: DispositionKind,
    /// Target construct; required unless the new kind is `NotRequired`.
    pub target_construct: Option<String>,
    /// Why the operator overrode the verdict; recorded verbatim.
    pub rationale: String,
}

impl MigrationEngine {
    /// Revise one disposition of a completed run.
    ///
    /// Returns a new revision with the same run id: dispositions updated,
    /// coverage recomputed, document re-synthesized, validation re-run, and
    /// the manual plan reassembled. The input run is left untouched.
    ///
    /// Artifact bookkeeping: artifacts whose plugin is no longer any custom
    /// disposition's target are dropped, and a policy newly reclassified to
    /// `Custom` gets a synthesis-failure entry (no generated code exists for
    /// it yet) and therefore a critical manual step. The narrative carries
    /// over unchanged; overridden verdicts carry full confidence.
    ///
    /// # Errors
    /// - [`MigrationError::InputMalformed`] for a policy the run does not
    ///   contain, a `Bundled` target kind, a missing or forbidden construct,
    ///   or an empty rationale;
    /// - [`MigrationError::BundleInvariantViolation`] when the policy's
    ///   bundle still has other members classified `Bundled`;
    /// - [`MigrationError::Internal`] when the stored run is inconsistent.
    pub fn apply_override(
        &self,
        run: &MigrationRun,
        request: OverrideRequest,
    ) -> Result<MigrationRun, MigrationError> {
        if run.proxy.find_policy(&request.policy_id).is_none() {
            return Err(malformed(&request, "policy_id", "policy not present in the run"));
        }
        let revised = build_revision(&request)?;

        let index = run
            .dispositions
            .iter()
            .position(|d| d.policy_id == request.policy_id)
            .ok_or_else(|| {
                MigrationError::Internal(format!(
                    "run has no disposition for policy '{}'",
                    request.policy_id
                ))
            })?;

        let original = &run.dispositions[index];
        if original.kind == DispositionKind::Bundled {
            if let Some(bundle_id) = original.bundle_id {
                let sibling_still_bundled = run.dispositions.iter().enumerate().any(|(i, d)| {
                    i != index
                        && d.kind == DispositionKind::Bundled
                        && d.bundle_id == Some(bundle_id)
                });
                if sibling_still_bundled {
                    return Err(MigrationError::BundleInvariantViolation {
                        invariant: "bundle members reclassify together".into(),
                        bundle_id,
                        policy_id: request.policy_id.clone(),
                    });
                }
            }
        }

        let mut dispositions = run.dispositions.clone();
        dispositions[index] = revised;

        let synthesis = rebuild_synthesis(run, &dispositions);
        let mut warnings = run.package.warnings.clone();
        warnings.push(format!(
            "disposition for '{}' manually overridden to {}",
            request.policy_id, request.kind
        ));

        let mut package =
            self.assemble_package(&run.proxy, &dispositions, &run.bundles, synthesis, warnings)?;
        package.narrative = run.package.narrative.clone();

        info!(
            run = %run.id,
            policy = %request.policy_id,
            kind = %request.kind,
            "override applied"
        );

        Ok(MigrationRun {
            id: run.id,
            proxy_name: run.proxy_name.clone(),
            started_at: run.started_at,
            completed_at: Utc::now(),
            proxy: run.proxy.clone(),
            bundles: run.bundles.clone(),
            dispositions,
            package,
        })
    }
}

fn build_revision(request: &OverrideRequest) -> Result<Disposition, MigrationError> {
    if request.rationale.trim().is_empty() {
        return Err(malformed(request, "rationale", "rationale must not be empty"));
    }
    let revised = match request.kind {
        DispositionKind::Bundled => {
            return Err(malformed(
                request,
                "kind",
                "bundles are formed by the planner; reclassify members individually instead",
            ));
        }
        DispositionKind::NotRequired => {
            if request.target_construct.is_some() {
                return Err(malformed(
                    request,
                    "target_construct",
                    "not-required carries no construct",
                ));
            }
            Disposition::not_required(request.policy_id.clone(), request.rationale.clone())
        }
        DispositionKind::Direct | DispositionKind::Custom => {
            let Some(construct) = request.target_construct.clone() else {
                return Err(malformed(
                    request,
                    "target_construct",
                    "a target construct is required for this kind",
                ));
            };
            if construct.trim().is_empty() {
                return Err(malformed(
                    request,
                    "target_construct",
                    "target construct must not be empty",
                ));
            }
            if request.kind == DispositionKind::Direct {
                Disposition::direct(
                    request.policy_id.clone(),
                    construct,
                    Confidence::FULL,
                    request.rationale.clone(),
                )
            } else {
                Disposition::custom(
                    request.policy_id.clone(),
                    construct,
                    Confidence::FULL,
                    request.rationale.clone(),
                )
            }
        }
    };
    revised
        .validate()
        .map_err(|err| MigrationError::Internal(err.to_string()))?;
    Ok(revised)
}

/// Re-derive the artifact and failure lists against the revised custom set.
fn rebuild_synthesis(run: &MigrationRun, dispositions: &[Disposition]) -> CustomSynthesis {
    let custom_targets: HashSet<&str> = dispositions
        .iter()
        .filter(|d| d.kind == DispositionKind::Custom)
        .filter_map(|d| d.target_construct.as_deref())
        .collect();
    let artifacts: Vec<_> = run
        .package
        .artifacts
        .iter()
        .filter(|a| custom_targets.contains(a.name.as_str()))
        .cloned()
        .collect();

    let still_custom: HashSet<&PolicyId> = dispositions
        .iter()
        .filter(|d| d.kind == DispositionKind::Custom)
        .map(|d| &d.policy_id)
        .collect();
    let mut failures: Vec<_> = run
        .package
        .synthesis_failures
        .iter()
        .filter(|f| still_custom.contains(&f.policy_id))
        .cloned()
        .collect();

    let covered: HashSet<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
    for disposition in dispositions {
        if disposition.kind != DispositionKind::Custom {
            continue;
        }
        let Some(construct) = disposition.target_construct.as_deref() else {
            continue;
        };
        if covered.contains(construct)
            || failures.iter().any(|f| f.policy_id == disposition.policy_id)
        {
            continue;
        }
        failures.push(SynthesisFailure {
            policy_id: disposition.policy_id.clone(),
            plugin_name: construct.to_owned(),
            reason: "reclassified manually; no generated code exists for this plugin".into(),
        });
    }

    CustomSynthesis {
        artifacts,
        failures,
        degraded: run.package.degraded,
    }
}

fn malformed(request: &OverrideRequest, field: &str, reason: &str) -> MigrationError {
    MigrationError::InputMalformed {
        policy_id: request.policy_id.clone(),
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}
