//! Functional tests for manual disposition rework on a finished run.
//!
//! - A rework recomputes the whole package under the same run identity.
//! - Bundle members reclassify together or not at all.
//! - Reclassifying to custom without generated code is recorded, not hidden.

use gatewright_core::{MigrationEngine, MigrationError, MigrationRun, OverrideRequest};
use gatewright_model::{Confidence, Disposition, DispositionKind, PolicyId, StepPriority};
use gatewright_test_utils::{api_key_quota_proxy, ScriptedGenerationService};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn engine() -> MigrationEngine {
    MigrationEngine::new(Arc::new(ScriptedGenerationService::new()))
}

fn disposition<'a>(run: &'a MigrationRun, id: &str) -> &'a Disposition {
    run.dispositions
        .iter()
        .find(|d| d.policy_id.as_str() == id)
        .unwrap_or_else(|| panic!("no disposition for '{id}'"))
}

fn rework(
    policy_id: &str,
    kind: DispositionKind,
    target_construct: Option<&str>,
    rationale: &str,
) -> OverrideRequest {
    OverrideRequest {
        policy_id: PolicyId::new(policy_id),
        kind,
        target_construct: target_construct.map(str::to_owned),
        rationale: rationale.to_owned(),
    }
}

/// Tenet: bundle members reclassify together or not at all; a partial
/// rework is rejected with nothing recomputed.
#[tokio::test]
async fn reworking_a_live_bundle_member_is_rejected() {
    let engine = engine();
    let run = engine.migrate(api_key_quota_proxy()).await.unwrap();
    assert_eq!(run.bundles.len(), 1);

    let err = engine
        .apply_override(
            &run,
            rework(
                "verify-key",
                DispositionKind::Direct,
                Some("key-auth"),
                "keep auth standalone",
            ),
        )
        .unwrap_err();

    match err {
        MigrationError::BundleInvariantViolation { policy_id, .. } => {
            assert_eq!(policy_id.as_str(), "verify-key");
        }
        other => panic!("expected BundleInvariantViolation, got {other:?}"),
    }

    // Both members still sit in the original bundle.
    assert_eq!(
        disposition(&run, "verify-key").kind,
        DispositionKind::Bundled
    );
    assert_eq!(disposition(&run, "quota").kind, DispositionKind::Bundled);
}

/// Tenet: a rework verdict recomputes document, coverage and steps under
/// the same run identity.
#[tokio::test]
async fn rework_recomputes_the_package_under_the_same_identity() {
    let engine = engine();
    let run = engine.migrate(api_key_quota_proxy()).await.unwrap();

    let reworked = engine
        .apply_override(
            &run,
            rework(
                "log",
                DispositionKind::NotRequired,
                None,
                "platform access logs cover this",
            ),
        )
        .unwrap();

    assert_eq!(reworked.id, run.id);
    assert!(reworked.completed_at >= run.completed_at);

    let log = disposition(&reworked, "log");
    assert_eq!(log.kind, DispositionKind::NotRequired);
    assert_eq!(log.confidence, Confidence::FULL);

    let coverage = &reworked.package.coverage;
    assert!(coverage.is_conserved());
    assert_eq!(coverage.not_required, 1);
    assert_eq!(coverage.auto_migrated, 0);

    assert!(reworked
        .package
        .document
        .plugins
        .iter()
        .all(|p| p.name != "file-log"));
    assert!(reworked
        .package
        .warnings
        .iter()
        .any(|w| w.contains("overridden")));
    // A rework does not touch the original ledger.
    assert_eq!(disposition(&run, "log").kind, DispositionKind::Direct);
    // The narrative is not re-drafted for a rework.
    assert_eq!(reworked.package.narrative, run.package.narrative);
}

/// Tenet: reclassifying to custom without generated code records a
/// synthesis failure and a critical step, not silence.
#[tokio::test]
async fn rework_to_custom_records_the_missing_code() {
    let engine = engine();
    let run = engine.migrate(api_key_quota_proxy()).await.unwrap();

    let reworked = engine
        .apply_override(
            &run,
            rework(
                "log",
                DispositionKind::Custom,
                Some("custom-log-ship"),
                "file-log loses the structured fields this proxy emits",
            ),
        )
        .unwrap();

    assert_eq!(reworked.package.synthesis_failures.len(), 1);
    let failure = &reworked.package.synthesis_failures[0];
    assert_eq!(failure.plugin_name, "custom-log-ship");
    assert!(failure.reason.contains("reclassified"));

    assert!(reworked
        .package
        .manual_steps
        .iter()
        .any(|s| s.priority == StepPriority::Critical && s.title.contains("custom-log-ship")));
    assert!(reworked.package.coverage.is_conserved());
    assert_eq!(reworked.package.coverage.custom_required, 1);
}

/// Tenet: a corrected target construct flows into the document verbatim.
#[tokio::test]
async fn rework_to_an_alternate_construct_rewrites_the_entry() {
    let engine = engine();
    let run = engine.migrate(api_key_quota_proxy()).await.unwrap();

    let reworked = engine
        .apply_override(
            &run,
            rework(
                "log",
                DispositionKind::Direct,
                Some("http-log"),
                "ship logs to the collector instead of local disk",
            ),
        )
        .unwrap();

    let log = disposition(&reworked, "log");
    assert_eq!(log.kind, DispositionKind::Direct);
    assert_eq!(log.confidence, Confidence::FULL);
    assert_eq!(log.target_construct.as_deref(), Some("http-log"));

    let names: Vec<&str> = reworked
        .package
        .document
        .plugins
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert!(names.contains(&"http-log"));
    assert!(!names.contains(&"file-log"));
}
