//! Functional tests for the end-to-end migration pipeline.
//!
//! - One engine call yields dispositions, a deployable document, coverage
//!   and manual steps that all agree with each other.
//! - Generation-service trouble degrades a run; it never fails one.
//! - Identical inputs reproduce identical packages, run ids aside.

use gatewright_core::{CancelSignal, EngineConfig, MigrationEngine, MigrationError, MigrationRun};
use gatewright_model::{
    BundlingAdvice, Confidence, Disposition, DispositionKind, ExecutionPhase, PolicyFlow,
    ProxyModel, RouteSpec, StepCategory, StepPriority,
};
use gatewright_synth::INSTALLATION_PENDING_TAG;
use gatewright_test_utils::{
    advice_with_group, api_key_quota_proxy, policy, policy_in, pre_request_proxy, upstream,
    ScriptedGenerationService,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn engine_with(service: ScriptedGenerationService) -> MigrationEngine {
    MigrationEngine::new(Arc::new(service))
}

fn disposition<'a>(run: &'a MigrationRun, id: &str) -> &'a Disposition {
    run.dispositions
        .iter()
        .find(|d| d.policy_id.as_str() == id)
        .unwrap_or_else(|| panic!("no disposition for '{id}'"))
}

/// Tenet: adjacent eligible policies collapse into one construct while the
/// rest of the proxy migrates one-to-one.
#[tokio::test]
async fn bundleable_pair_collapses_around_a_direct_logger() {
    let engine = engine_with(ScriptedGenerationService::new());
    let run = engine.migrate(api_key_quota_proxy()).await.unwrap();

    assert_eq!(run.proxy_name, "orders");
    assert_eq!(run.bundles.len(), 1);
    let bundle = &run.bundles[0];
    let members: Vec<&str> = bundle
        .member_policy_ids()
        .iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(members, ["verify-key", "quota"]);
    assert_eq!(bundle.target_construct(), "rate-limiting");

    let verify = disposition(&run, "verify-key");
    assert_eq!(verify.kind, DispositionKind::Bundled);
    assert_eq!(verify.bundle_id, Some(bundle.id()));
    let quota = disposition(&run, "quota");
    assert_eq!(quota.bundle_id, Some(bundle.id()));
    let log = disposition(&run, "log");
    assert_eq!(log.kind, DispositionKind::Direct);
    assert_eq!(log.target_construct.as_deref(), Some("file-log"));

    let coverage = &run.package.coverage;
    assert!(coverage.is_conserved());
    assert_eq!(coverage.total_policies, 3);
    assert_eq!(coverage.bundled_count, 2);
    assert_eq!(coverage.auto_migrated, 1);
    assert_eq!(coverage.custom_required, 0);
    assert_eq!(coverage.bundling_efficiency_percentage, 50.0);

    let document = &run.package.document;
    assert_eq!(document.services.len(), 1);
    assert_eq!(document.services[0].name, "orders-svc");
    assert_eq!(document.services[0].routes.len(), 1);
    assert_eq!(document.services[0].routes[0].paths, ["/orders"]);

    let names: Vec<&str> = document.plugins.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["rate-limiting", "file-log"]);
    let merged = &document.plugins[0];
    assert_eq!(merged.service.as_deref(), Some("orders-svc"));
    assert_eq!(merged.config.get("limit_by"), Some(&json!("consumer")));
    assert_eq!(merged.config.get("minute"), Some(&json!(600)));
    assert!(merged.config.contains_key("key_names"));

    assert!(run.package.validation.is_valid);
    assert!(run.package.artifacts.is_empty());
    assert!(run.package.synthesis_failures.is_empty());
    assert!(!run.package.degraded);
}

/// Tenet: an unrecognized source type becomes a zero-confidence custom
/// verdict and a scaffold, never an error.
#[tokio::test]
async fn unrecognized_type_degrades_to_zero_confidence_custom() {
    let proxy = pre_request_proxy("billing", vec![policy("mystery", "VendorMagic", 0)]);
    let engine = engine_with(ScriptedGenerationService::new());
    let run = engine.migrate(proxy).await.unwrap();

    let verdict = disposition(&run, "mystery");
    assert_eq!(verdict.kind, DispositionKind::Custom);
    assert_eq!(verdict.confidence, Confidence::ZERO);
    assert_eq!(verdict.target_construct.as_deref(), Some("custom-mystery"));
    assert!(verdict.rationale.contains("unrecognized"));

    assert_eq!(run.package.coverage.custom_required, 1);
    assert!(run.package.coverage.is_conserved());
    assert!(run
        .package
        .warnings
        .iter()
        .any(|w| w.contains("VendorMagic")));

    assert_eq!(run.package.artifacts.len(), 1);
    assert_eq!(run.package.artifacts[0].name, "custom-mystery");
    let entry = run
        .package
        .document
        .plugins
        .iter()
        .find(|p| p.name == "custom-mystery")
        .expect("custom plugin entry");
    assert!(entry.tags.iter().any(|t| t == INSTALLATION_PENDING_TAG));
    assert!(!run.package.degraded);
}

/// Tenet: policies the target covers natively leave the document but stay
/// on the books.
#[tokio::test]
async fn native_capabilities_migrate_to_nothing() {
    let proxy = pre_request_proxy(
        "metrics",
        vec![
            policy("stats", "StatisticsCollector", 0),
            policy("cors", "CORS", 1),
        ],
    );
    let engine = engine_with(ScriptedGenerationService::new());
    let run = engine.migrate(proxy).await.unwrap();

    let stats = disposition(&run, "stats");
    assert_eq!(stats.kind, DispositionKind::NotRequired);
    assert!(stats.target_construct.is_none());
    assert_eq!(run.package.coverage.not_required, 1);

    let names: Vec<&str> = run
        .package
        .document
        .plugins
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, ["cors"]);
    assert!(run.package.validation.is_valid);
}

/// Tenet: a dead generation service degrades the run to local scaffolds
/// instead of failing it.
#[tokio::test]
async fn generation_outage_degrades_the_run_without_failing_it() {
    let proxy = pre_request_proxy(
        "ledger",
        vec![
            policy("enrich", "JavaCallout", 0),
            policy("reshape", "Javascript", 1),
            policy("cors", "CORS", 2),
        ],
    );
    let service = Arc::new(ScriptedGenerationService::unavailable());
    let engine = MigrationEngine::new(service.clone());
    let run = engine.migrate(proxy).await.unwrap();

    assert!(run.package.degraded);
    // The first refusal switches the run to offline scaffolding; the second
    // custom never touches the wire.
    assert_eq!(service.plugin_calls(), 1);

    let names: Vec<&str> = run
        .package
        .artifacts
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(names, ["custom-enrich", "custom-reshape"]);
    assert!(run.package.warnings.iter().any(|w| w.contains("unavailable")));
    assert!(run.package.narrative.is_none());

    let steps = &run.package.manual_steps;
    assert!(steps
        .iter()
        .any(|s| s.priority == StepPriority::Critical && s.title.contains("custom-enrich")));
    assert!(steps
        .iter()
        .any(|s| s.priority == StepPriority::High && s.category == StepCategory::Testing));
    assert!(run.package.coverage.is_conserved());
}

/// Tenet: advisory proposals are adopted only when they match or beat the
/// greedy plan; illegal groups are discarded with a warning.
#[tokio::test]
async fn advisory_proposals_never_worsen_the_greedy_plan() {
    let advice = advice_with_group(&["verify-key", "log"], "group them anyway");
    let service = ScriptedGenerationService::new().with_advice(Ok(advice));
    let engine = engine_with(service);
    let run = engine.migrate(api_key_quota_proxy()).await.unwrap();

    // The logger is not bundle-eligible, so the proposal dies and the
    // greedy pair survives untouched.
    assert_eq!(run.bundles.len(), 1);
    let members: Vec<&str> = run.bundles[0]
        .member_policy_ids()
        .iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(members, ["verify-key", "quota"]);
    assert!(run
        .package
        .warnings
        .iter()
        .any(|w| w.contains("discarded") && w.contains("log")));
}

/// Tenet: advisory confidence overrides land in the ledger, clamped to the
/// unit interval.
#[tokio::test]
async fn advisory_confidence_overrides_reach_the_ledger() {
    let proxy = pre_request_proxy(
        "assets",
        vec![
            policy("cors", "CORS", 0),
            policy("log", "MessageLogging", 1),
        ],
    );
    let mut advice = BundlingAdvice::none();
    advice.confidences.insert("cors".into(), 7.0);
    advice.confidences.insert("log".into(), 0.65);
    let service = ScriptedGenerationService::new().with_advice(Ok(advice));
    let engine = engine_with(service);
    let run = engine.migrate(proxy).await.unwrap();

    assert_eq!(disposition(&run, "cors").confidence, Confidence::FULL);
    assert_eq!(disposition(&run, "log").confidence.value(), 0.65);
}

/// Tenet: narrative prose is the service's verbatim or nothing; the engine
/// never writes its own.
#[tokio::test]
async fn narrative_prose_passes_through_verbatim() {
    let prose = "The orders proxy migrates cleanly; review the quota window before cutover.";
    let service = Arc::new(ScriptedGenerationService::new().with_report(Ok(prose.to_owned())));
    let engine = MigrationEngine::new(service.clone());
    let run = engine.migrate(api_key_quota_proxy()).await.unwrap();

    assert_eq!(run.package.narrative.as_deref(), Some(prose));
    assert_eq!(service.report_calls(), 1);
    assert!(!run.package.degraded);
}

/// Tenet: identical inputs reproduce identical packages; only run ids and
/// clocks may differ.
#[tokio::test]
async fn identical_inputs_reproduce_identical_packages() {
    let run = || async {
        engine_with(ScriptedGenerationService::new())
            .migrate(api_key_quota_proxy())
            .await
            .unwrap()
    };
    let first = run().await;
    let second = run().await;

    assert_ne!(first.id, second.id);
    assert_eq!(first.package.document, second.package.document);
    assert_eq!(
        first.package.document.to_yaml().unwrap(),
        second.package.document.to_yaml().unwrap()
    );
    assert_eq!(first.package.coverage, second.package.coverage);
    assert_eq!(first.package.manual_steps, second.package.manual_steps);
    assert_eq!(first.package.warnings, second.package.warnings);
    assert_eq!(first.package.narrative, second.package.narrative);

    let ledger = |run: &MigrationRun| {
        run.dispositions
            .iter()
            .map(|d| {
                (
                    d.policy_id.clone(),
                    d.kind,
                    d.target_construct.clone(),
                    d.confidence,
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(ledger(&first), ledger(&second));

    let shape = |run: &MigrationRun| {
        run.bundles
            .iter()
            .map(|b| (b.member_policy_ids().to_vec(), b.target_construct().to_owned()))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&first), shape(&second));
}

/// Tenet: the rendered document opens with its format header and lists
/// plugins in descending priority order.
#[tokio::test]
async fn document_opens_with_header_and_descends_in_priority() {
    let engine = engine_with(ScriptedGenerationService::new());
    let run = engine.migrate(api_key_quota_proxy()).await.unwrap();

    let yaml = run.package.document.to_yaml().unwrap();
    assert!(yaml.starts_with("_format_version: '3.0'\n_transform: true\n"));

    let priorities: Vec<i64> = run
        .package
        .document
        .plugins
        .iter()
        .map(|p| p.priority)
        .collect();
    assert_eq!(priorities, [1000, 990]);
    assert!(priorities.windows(2).all(|w| w[0] > w[1]));
}

/// Tenet: the priority ladder starts at the configured ceiling and steps by
/// the configured stride.
#[tokio::test]
async fn priority_ladder_follows_the_configured_ceiling() {
    let config = EngineConfig::default()
        .with_priority_ceiling(2000)
        .with_priority_step(100);
    let engine = engine_with(ScriptedGenerationService::new()).with_config(config);
    let run = engine.migrate(api_key_quota_proxy()).await.unwrap();

    let priorities: Vec<i64> = run
        .package
        .document
        .plugins
        .iter()
        .map(|p| p.priority)
        .collect();
    assert_eq!(priorities, [2000, 1900]);
}

/// Tenet: each execution phase carries its own priority ladder.
#[tokio::test]
async fn phases_carry_independent_priority_ladders() {
    let pre = PolicyFlow::new("preflow", ExecutionPhase::PreRequest)
        .with_policy(policy_in(
            "cors",
            "CORS",
            "preflow",
            ExecutionPhase::PreRequest,
            0,
        ))
        .with_policy(policy_in(
            "verify",
            "VerifyAPIKey",
            "preflow",
            ExecutionPhase::PreRequest,
            1,
        ));
    let post = PolicyFlow::new("postflow", ExecutionPhase::PostRequest)
        .with_policy(policy_in(
            "cache",
            "ResponseCache",
            "postflow",
            ExecutionPhase::PostRequest,
            0,
        ))
        .with_policy(policy_in(
            "audit",
            "MessageLogging",
            "postflow",
            ExecutionPhase::PostRequest,
            1,
        ));
    let proxy = ProxyModel::new("mixed", upstream("mixed-core"))
        .with_route(RouteSpec::new("mixed-route", "/mixed").with_method("GET"))
        .with_flow(pre)
        .with_flow(post);

    let engine = engine_with(ScriptedGenerationService::new());
    let run = engine.migrate(proxy).await.unwrap();

    let entries: Vec<(&str, i64)> = run
        .package
        .document
        .plugins
        .iter()
        .map(|p| (p.name.as_str(), p.priority))
        .collect();
    assert_eq!(
        entries,
        [
            ("cors", 1000),
            ("key-auth", 990),
            ("proxy-cache", 1000),
            ("file-log", 990),
        ]
    );
    assert!(run.package.validation.is_valid);
}

/// Tenet: a cancelled signal stops the run before any service traffic.
#[tokio::test]
async fn cancelled_signal_stops_the_run_before_service_traffic() {
    let service = Arc::new(ScriptedGenerationService::new());
    let engine = MigrationEngine::new(service.clone());
    let cancel = CancelSignal::new();
    cancel.cancel();

    let err = engine
        .migrate_with_cancel(api_key_quota_proxy(), &cancel)
        .await
        .unwrap_err();
    match err {
        MigrationError::Cancelled => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert_eq!(service.advice_calls(), 0);
    assert_eq!(service.plugin_calls(), 0);
    assert_eq!(service.report_calls(), 0);
}
