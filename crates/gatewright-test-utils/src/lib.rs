//! Testing utilities for the gatewright workspace.
//!
//! Fixture builders for proxies, flows, and policies, plus a scripted
//! generation service that replays pre-loaded replies.

#![allow(missing_docs)]

use async_trait::async_trait;
use gatewright_gensvc::{
    AdvisoryRequest, GenError, GenerationService, PluginArtifact, PluginRequest, ReportRequest,
};
use gatewright_model::{
    AdvisoryGroup, BundlingAdvice, ExecutionPhase, PolicyDescriptor, PolicyFlow, PolicyId,
    ProxyModel, RouteSpec, UpstreamService,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub fn upstream(name: &str) -> UpstreamService {
    UpstreamService::new(name, format!("https://{name}.internal.example.com"))
}

pub fn policy(id: &str, policy_type: &str, order: u32) -> PolicyDescriptor {
    policy_in(id, policy_type, "preflow", ExecutionPhase::PreRequest, order)
}

pub fn policy_in(
    id: &str,
    policy_type: &str,
    flow: &str,
    phase: ExecutionPhase,
    order: u32,
) -> PolicyDescriptor {
    PolicyDescriptor::new(id, policy_type, phase, flow, order)
}

/// A proxy with one route and one pre-request flow holding the given
/// policies.
pub fn pre_request_proxy(name: &str, policies: Vec<PolicyDescriptor>) -> ProxyModel {
    let mut flow = PolicyFlow::new("preflow", ExecutionPhase::PreRequest);
    for p in policies {
        flow = flow.with_policy(p);
    }
    ProxyModel::new(name, upstream(&format!("{name}-svc")))
        .with_route(RouteSpec::new(format!("{name}-route"), format!("/{name}")).with_method("GET"))
        .with_flow(flow)
}

/// The classic three-policy proxy: a bundleable auth + quota pair and a
/// logger the table keeps out of bundles.
pub fn api_key_quota_proxy() -> ProxyModel {
    pre_request_proxy(
        "orders",
        vec![
            policy("verify-key", "VerifyAPIKey", 0).with_config("APIKeyHeader", json!("x-api-key")),
            policy("quota", "Quota", 1)
                .with_config("Allow", json!(600))
                .with_config("Interval", json!(1))
                .with_config("TimeUnit", json!("minute")),
            policy("log", "MessageLogging", 2)
                .with_config("LogPath", json!("/var/log/orders.log")),
        ],
    )
}

/// Advice carrying a single proposed group and no confidence overrides.
pub fn advice_with_group(ids: &[&str], rationale: &str) -> BundlingAdvice {
    let mut advice = BundlingAdvice::none();
    advice.groups.push(AdvisoryGroup::new(
        ids.iter().map(|id| PolicyId::new(*id)).collect(),
        rationale,
    ));
    advice
}

type Scripted<T> = Mutex<VecDeque<Result<T, GenError>>>;

/// A generation service that replays pre-loaded replies.
///
/// Each call pops the next reply of its kind; an empty queue falls back to
/// a benign default (empty advice, a valid scaffold named as requested,
/// canned prose). [`ScriptedGenerationService::unavailable`] builds one
/// that refuses every call, for outage tests. Call counters let tests
/// assert how often the engine asked.
#[derive(Debug, Default)]
pub struct ScriptedGenerationService {
    advice: Scripted<BundlingAdvice>,
    plugins: Scripted<PluginArtifact>,
    reports: Scripted<String>,
    advice_calls: AtomicU32,
    plugin_calls: AtomicU32,
    report_calls: AtomicU32,
    refuse_all: bool,
}

impl ScriptedGenerationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service whose every call reports an exhausted retry budget.
    pub fn unavailable() -> Self {
        Self {
            refuse_all: true,
            ..Self::default()
        }
    }

    pub fn push_advice(&self, reply: Result<BundlingAdvice, GenError>) {
        self.advice.lock().unwrap().push_back(reply);
    }

    pub fn push_plugin(&self, reply: Result<PluginArtifact, GenError>) {
        self.plugins.lock().unwrap().push_back(reply);
    }

    pub fn push_report(&self, reply: Result<String, GenError>) {
        self.reports.lock().unwrap().push_back(reply);
    }

    #[must_use]
    pub fn with_advice(self, reply: Result<BundlingAdvice, GenError>) -> Self {
        self.push_advice(reply);
        self
    }

    #[must_use]
    pub fn with_plugin(self, reply: Result<PluginArtifact, GenError>) -> Self {
        self.push_plugin(reply);
        self
    }

    #[must_use]
    pub fn with_report(self, reply: Result<String, GenError>) -> Self {
        self.push_report(reply);
        self
    }

    pub fn advice_calls(&self) -> u32 {
        self.advice_calls.load(Ordering::SeqCst)
    }

    pub fn plugin_calls(&self) -> u32 {
        self.plugin_calls.load(Ordering::SeqCst)
    }

    pub fn report_calls(&self) -> u32 {
        self.report_calls.load(Ordering::SeqCst)
    }

    fn outage() -> GenError {
        GenError::Unavailable {
            attempts: 3,
            message: "scripted outage".into(),
        }
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerationService {
    async fn advise_bundling(&self, _request: AdvisoryRequest) -> Result<BundlingAdvice, GenError> {
        self.advice_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_all {
            return Err(Self::outage());
        }
        self.advice
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(BundlingAdvice::none()))
    }

    async fn synthesize_plugin(&self, request: PluginRequest) -> Result<PluginArtifact, GenError> {
        self.plugin_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_all {
            return Err(Self::outage());
        }
        self.plugins.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(PluginArtifact::fallback(
                &request.construct_name,
                &request.source_type,
                "scripted default scaffold",
            ))
        })
    }

    async fn draft_report(&self, request: ReportRequest) -> Result<String, GenError> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_all {
            return Err(Self::outage());
        }
        self.reports.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(format!(
                "Migration of '{}' completed with {:.1}% automatic coverage.",
                request.proxy_name, request.coverage.coverage_percentage
            ))
        })
    }
}
