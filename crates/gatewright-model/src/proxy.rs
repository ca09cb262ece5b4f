//! The normalized proxy input a run operates on.
//!
//! Archive parsing and upload handling happen upstream of this crate; by the
//! time a [`ProxyModel`] exists the source export has already been reduced
//! to an upstream target, routes, and ordered policy flows.

use crate::policy::{PolicyDescriptor, PolicyFlow, PolicyId};
use serde::{Deserialize, Serialize};

fn default_retries() -> u32 {
    5
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_strip_path() -> bool {
    true
}

/// The backend service the proxy fronts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamService {
    /// Service name; becomes the target config's service name.
    pub name: String,
    /// Full upstream URL, scheme included.
    pub url: String,
    /// Connect-level retry count.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl UpstreamService {
    /// Create a service with the default retry/timeout envelope.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            retries: default_retries(),
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
        }
    }
}

/// One exposed route of the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Route name; must be unique within the proxy.
    pub name: String,
    /// Path prefixes the route matches.
    pub paths: Vec<String>,
    /// HTTP methods; empty means all.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Whether the matched prefix is stripped before proxying.
    #[serde(default = "default_strip_path")]
    pub strip_path: bool,
}

impl RouteSpec {
    /// Create a route matching one path prefix for all methods.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            paths: vec![path.into()],
            methods: Vec::new(),
            strip_path: default_strip_path(),
        }
    }

    /// Restrict the route to one HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.methods.push(method.into());
        self
    }
}

/// A complete normalized proxy: the engine's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyModel {
    /// Proxy name from the source export.
    pub name: String,
    /// Backend the proxy forwards to.
    pub upstream: UpstreamService,
    /// Exposed routes.
    pub routes: Vec<RouteSpec>,
    /// Policy flows, each phase-homogeneous.
    pub flows: Vec<PolicyFlow>,
}

impl ProxyModel {
    /// Create a proxy with no routes or flows.
    #[must_use]
    pub fn new(name: impl Into<String>, upstream: UpstreamService) -> Self {
        Self {
            name: name.into(),
            upstream,
            routes: Vec::new(),
            flows: Vec::new(),
        }
    }

    /// Append a route.
    #[must_use]
    pub fn with_route(mut self, route: RouteSpec) -> Self {
        self.routes.push(route);
        self
    }

    /// Append a flow.
    #[must_use]
    pub fn with_flow(mut self, flow: PolicyFlow) -> Self {
        self.flows.push(flow);
        self
    }

    /// Total number of policies across all flows.
    #[must_use]
    pub fn policy_count(&self) -> usize {
        self.flows.iter().map(|f| f.policies.len()).sum()
    }

    /// Iterate every policy in every flow, flow order then member order.
    pub fn all_policies(&self) -> impl Iterator<Item = &PolicyDescriptor> {
        self.flows.iter().flat_map(|f| f.policies.iter())
    }

    /// Look up a policy by id anywhere in the proxy.
    #[must_use]
    pub fn find_policy(&self, id: &PolicyId) -> Option<&PolicyDescriptor> {
        self.all_policies().find(|p| &p.id == id)
    }
}
