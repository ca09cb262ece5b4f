//! Wire DTOs for the generation service.
//!
//! Requests carry everything the service needs in one shot; there is no
//! session state on either side, which keeps retries safe.

use gatewright_model::{CoverageReport, Disposition, ExecutionPhase, PolicyId, RawConfig};
use serde::{Deserialize, Serialize};

/// One policy, summarized as advisory context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySummary {
    /// Policy id.
    pub id: PolicyId,
    /// Source type wire name.
    pub policy_type: String,
    /// Execution phase.
    pub phase: ExecutionPhase,
    /// Owning flow.
    pub flow_name: String,
    /// Position within the flow.
    pub order_index: u32,
    /// Mapped target construct, when the table knows one.
    pub target_construct: Option<String>,
    /// Whether the table allows this policy into bundles.
    pub bundle_eligible: bool,
}

/// Request for bundling advice over a whole proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    /// Proxy being migrated.
    pub proxy_name: String,
    /// Every policy in the run, in flow order.
    pub policies: Vec<PolicySummary>,
}

/// What generated plugin code must look like to be accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginContract {
    /// Implementation language of the target gateway's plugins.
    pub language: String,
    /// Lifecycle entry points the handler may implement; at least one is
    /// required.
    pub lifecycle_phases: Vec<String>,
}

impl Default for PluginContract {
    fn default() -> Self {
        Self {
            language: "lua".into(),
            lifecycle_phases: vec![
                "init_worker".into(),
                "rewrite".into(),
                "access".into(),
                "header_filter".into(),
                "body_filter".into(),
                "log".into(),
            ],
        }
    }
}

/// Request to synthesize one custom plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRequest {
    /// Name the plugin must register under.
    pub construct_name: String,
    /// Source policy type being replaced.
    pub source_type: String,
    /// The policy this plugin stands in for.
    pub source_policy_id: PolicyId,
    /// The source policy's configuration payload.
    pub raw_config: RawConfig,
    /// Shape the produced code must satisfy.
    pub contract: PluginContract,
    /// Mapping-table notes, when present.
    pub notes: Option<String>,
}

/// Request for a human-readable migration narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Proxy being migrated.
    pub proxy_name: String,
    /// Final coverage numbers.
    pub coverage: CoverageReport,
    /// Every per-policy verdict.
    pub dispositions: Vec<Disposition>,
    /// Run warnings worth mentioning in prose.
    pub warnings: Vec<String>,
}

/// Service reply carrying the narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportReply {
    /// Prose summary; passed through verbatim.
    pub narrative: String,
}
