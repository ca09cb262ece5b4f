//! Source-side policy descriptors.
//!
//! A proxy export is normalized into ordered flows of [`PolicyDescriptor`]s
//! before the pipeline runs. Identity, typing and ordering live here; what
//! each type migrates *to* is the mapping table's concern.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a policy within one migration run.
///
/// Taken verbatim from the source descriptor (Apigee policy name), so it is
/// a string rather than a generated id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(String);

impl PolicyId {
    /// Wrap a source policy name.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw source name.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the source descriptor carried no usable name.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for PolicyId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PolicyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source policy type, using the legacy gateway's wire names.
///
/// Unknown names are preserved in [`PolicyType::Other`] instead of failing
/// deserialization; classification decides what to do with them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PolicyType {
    /// API key verification (`VerifyAPIKey`).
    VerifyApiKey,
    /// Quota enforcement over an interval (`Quota`).
    Quota,
    /// Short-burst traffic smoothing (`SpikeArrest`).
    SpikeArrest,
    /// OAuth 2.0 token verification and issuance (`OAuthV2`).
    OAuthV2,
    /// Cross-origin resource sharing headers (`CORS`).
    Cors,
    /// Request/response message rewriting (`AssignMessage`).
    AssignMessage,
    /// Response caching (`ResponseCache`).
    ResponseCache,
    /// Transaction logging to external sinks (`MessageLogging`).
    MessageLogging,
    /// HTTP basic authentication (`BasicAuthentication`).
    BasicAuthentication,
    /// XML payload conversion (`XMLToJSON`).
    XmlToJson,
    /// JSON payload conversion (`JSONToXML`).
    JsonToXml,
    /// Inline JavaScript callout (`Javascript`).
    JavaScript,
    /// Compiled Java callout (`JavaCallout`).
    JavaCallout,
    /// Mid-flow HTTP callout to another service (`ServiceCallout`).
    ServiceCallout,
    /// JSON payload threat limits (`JSONThreatProtection`).
    JsonThreatProtection,
    /// XML payload threat limits (`XMLThreatProtection`).
    XmlThreatProtection,
    /// Analytics counters (`StatisticsCollector`).
    StatisticsCollector,
    /// Entity profile lookups (`AccessEntity`).
    AccessEntity,
    /// Key-value map reads/writes (`KeyValueMapOperations`).
    KeyValueMapOperations,
    /// Fault injection / error responses (`RaiseFault`).
    RaiseFault,
    /// Shared-flow invocation (`FlowCallout`).
    FlowCallout,
    /// Any type not in the known set; the wire name is kept as-is.
    Other(String),
}

impl PolicyType {
    /// The legacy gateway's wire name for this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::VerifyApiKey => "VerifyAPIKey",
            Self::Quota => "Quota",
            Self::SpikeArrest => "SpikeArrest",
            Self::OAuthV2 => "OAuthV2",
            Self::Cors => "CORS",
            Self::AssignMessage => "AssignMessage",
            Self::ResponseCache => "ResponseCache",
            Self::MessageLogging => "MessageLogging",
            Self::BasicAuthentication => "BasicAuthentication",
            Self::XmlToJson => "XMLToJSON",
            Self::JsonToXml => "JSONToXML",
            Self::JavaScript => "Javascript",
            Self::JavaCallout => "JavaCallout",
            Self::ServiceCallout => "ServiceCallout",
            Self::JsonThreatProtection => "JSONThreatProtection",
            Self::XmlThreatProtection => "XMLThreatProtection",
            Self::StatisticsCollector => "StatisticsCollector",
            Self::AccessEntity => "AccessEntity",
            Self::KeyValueMapOperations => "KeyValueMapOperations",
            Self::RaiseFault => "RaiseFault",
            Self::FlowCallout => "FlowCallout",
            Self::Other(name) => name,
        }
    }

    /// True for types outside the known set.
    #[inline]
    #[must_use]
    pub fn is_other(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl From<String> for PolicyType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "VerifyAPIKey" => Self::VerifyApiKey,
            "Quota" => Self::Quota,
            "SpikeArrest" => Self::SpikeArrest,
            "OAuthV2" => Self::OAuthV2,
            "CORS" => Self::Cors,
            "AssignMessage" => Self::AssignMessage,
            "ResponseCache" => Self::ResponseCache,
            "MessageLogging" => Self::MessageLogging,
            "BasicAuthentication" => Self::BasicAuthentication,
            "XMLToJSON" => Self::XmlToJson,
            "JSONToXML" => Self::JsonToXml,
            "Javascript" => Self::JavaScript,
            "JavaCallout" => Self::JavaCallout,
            "ServiceCallout" => Self::ServiceCallout,
            "JSONThreatProtection" => Self::JsonThreatProtection,
            "XMLThreatProtection" => Self::XmlThreatProtection,
            "StatisticsCollector" => Self::StatisticsCollector,
            "AccessEntity" => Self::AccessEntity,
            "KeyValueMapOperations" => Self::KeyValueMapOperations,
            "RaiseFault" => Self::RaiseFault,
            "FlowCallout" => Self::FlowCallout,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for PolicyType {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<PolicyType> for String {
    fn from(t: PolicyType) -> Self {
        t.as_str().to_owned()
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where in the proxy lifecycle a policy executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionPhase {
    /// Before the request reaches the upstream service.
    PreRequest,
    /// After the upstream response, before it returns to the client.
    PostRequest,
    /// Only on the error path.
    Error,
}

impl ExecutionPhase {
    /// Stable label used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreRequest => "pre-request",
            Self::PostRequest => "post-request",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed policy configuration, key order preserved from the source.
pub type RawConfig = IndexMap<String, serde_json::Value>;

/// One source policy attachment, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDescriptor {
    /// Unique policy id within the run.
    pub id: PolicyId,
    /// Source policy type.
    pub policy_type: PolicyType,
    /// Lifecycle phase the policy is attached to.
    pub phase: ExecutionPhase,
    /// Name of the flow the policy belongs to.
    pub flow_name: String,
    /// Position within the flow; execution order is ascending.
    pub order_index: u32,
    /// Parsed configuration payload from the source descriptor.
    #[serde(default)]
    pub raw_config: RawConfig,
    /// Ids of policies this one requires to have executed earlier.
    #[serde(default)]
    pub depends_on: Vec<PolicyId>,
}

impl PolicyDescriptor {
    /// Create a descriptor with an empty config and no dependencies.
    #[must_use]
    pub fn new(
        id: impl Into<PolicyId>,
        policy_type: impl Into<PolicyType>,
        phase: ExecutionPhase,
        flow_name: impl Into<String>,
        order_index: u32,
    ) -> Self {
        Self {
            id: id.into(),
            policy_type: policy_type.into(),
            phase,
            flow_name: flow_name.into(),
            order_index,
            raw_config: RawConfig::new(),
            depends_on: Vec::new(),
        }
    }

    /// Attach one configuration entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.raw_config.insert(key.into(), value);
        self
    }

    /// Declare an ordering dependency on another policy.
    #[must_use]
    pub fn with_dependency(mut self, id: impl Into<PolicyId>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// String view of one config value, when present and textual.
    #[must_use]
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.raw_config.get(key).and_then(serde_json::Value::as_str)
    }
}

/// An ordered group of policies attached to one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyFlow {
    /// Flow name from the source proxy.
    pub name: String,
    /// Phase all attached policies execute in.
    pub phase: ExecutionPhase,
    /// Member policies, not necessarily sorted.
    pub policies: Vec<PolicyDescriptor>,
}

impl PolicyFlow {
    /// Create an empty flow.
    #[must_use]
    pub fn new(name: impl Into<String>, phase: ExecutionPhase) -> Self {
        Self {
            name: name.into(),
            phase,
            policies: Vec::new(),
        }
    }

    /// Append a policy.
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyDescriptor) -> Self {
        self.policies.push(policy);
        self
    }

    /// Members sorted by ascending `order_index`; the execution order.
    #[must_use]
    pub fn ordered(&self) -> Vec<&PolicyDescriptor> {
        let mut out: Vec<&PolicyDescriptor> = self.policies.iter().collect();
        out.sort_by_key(|p| p.order_index);
        out
    }
}
