//! decK-style declarative document model.
//!
//! The document is the deployable artifact of a migration run: one YAML file
//! that the target gateway's declarative tooling can apply directly. Field
//! order matters for readability of the rendered file, so struct fields are
//! declared in render order and serialized with [`serde_yaml`].

use gatewright_model::proxy::{ProxyModel, RouteSpec};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Declarative format version emitted in the document header.
pub const FORMAT_VERSION: &str = "3.0";

/// Default retry count for synthesized service entries.
const DEFAULT_RETRIES: u32 = 5;

/// Default timeout, in milliseconds, for connect/read/write on a service.
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Root of the declarative config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckDocument {
    /// Declarative format version; always [`FORMAT_VERSION`] for emitted docs.
    #[serde(rename = "_format_version")]
    pub format_version: String,
    /// Whether the tooling may transform entity names on apply.
    #[serde(rename = "_transform")]
    pub transform: bool,
    /// Upstream services with their nested routes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceEntry>,
    /// Plugin entries, scoped to a service or route.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginEntry>,
}

impl DeckDocument {
    /// Creates an empty document with the current format header.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            transform: true,
            services: Vec::new(),
            plugins: Vec::new(),
        }
    }

    /// Returns `true` when the document declares no services and no plugins.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.plugins.is_empty()
    }

    /// Looks up a service entry by name.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceEntry> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Returns all plugin entries scoped to the given service.
    pub fn plugins_for_service<'a>(
        &'a self,
        service: &'a str,
    ) -> impl Iterator<Item = &'a PluginEntry> {
        self.plugins
            .iter()
            .filter(move |p| p.service.as_deref() == Some(service))
    }

    /// Renders the document as YAML.
    ///
    /// # Errors
    ///
    /// Returns the underlying serializer error if the document cannot be
    /// rendered, which only happens for non-string map keys injected through
    /// raw config values.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Parses a document from YAML.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserializer error for malformed input.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

impl Default for DeckDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// An upstream service with its routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Service name, unique within the document.
    pub name: String,
    /// Full upstream URL (scheme, host, port, path).
    pub url: String,
    /// Retry count for failed upstream requests.
    pub retries: u32,
    /// Connect timeout in milliseconds.
    pub connect_timeout: u64,
    /// Read timeout in milliseconds.
    pub read_timeout: u64,
    /// Write timeout in milliseconds.
    pub write_timeout: u64,
    /// Routes that dispatch to this service.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteEntry>,
}

impl ServiceEntry {
    /// Builds a service entry from a normalized proxy model, carrying over
    /// its upstream settings and routes.
    #[must_use]
    pub fn from_proxy(proxy: &ProxyModel) -> Self {
        Self {
            name: proxy.upstream.name.clone(),
            url: proxy.upstream.url.clone(),
            retries: proxy.upstream.retries,
            connect_timeout: proxy.upstream.connect_timeout_ms,
            read_timeout: proxy.upstream.read_timeout_ms,
            write_timeout: proxy.upstream.write_timeout_ms,
            routes: proxy.routes.iter().map(RouteEntry::from_spec).collect(),
        }
    }

    /// Builds a service entry with default retry and timeout settings.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            retries: DEFAULT_RETRIES,
            connect_timeout: DEFAULT_TIMEOUT_MS,
            read_timeout: DEFAULT_TIMEOUT_MS,
            write_timeout: DEFAULT_TIMEOUT_MS,
            routes: Vec::new(),
        }
    }
}

/// A route nested under a service entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Route name, unique within the document.
    pub name: String,
    /// Path prefixes matched by this route.
    pub paths: Vec<String>,
    /// HTTP methods matched by this route; empty means all methods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    /// Whether the matched path prefix is stripped before proxying.
    pub strip_path: bool,
}

impl RouteEntry {
    /// Builds a route entry from a normalized route spec.
    #[must_use]
    pub fn from_spec(spec: &RouteSpec) -> Self {
        Self {
            name: spec.name.clone(),
            paths: spec.paths.clone(),
            methods: spec.methods.clone(),
            strip_path: spec.strip_path,
        }
    }
}

/// A plugin entry scoped to a service or a route.
///
/// `priority` orders execution within a request phase: higher runs first.
/// The synthesizer assigns strictly decreasing priorities per phase so the
/// source policy order survives the migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Plugin (construct) name.
    pub name: String,
    /// Scoping service, mutually exclusive with a narrower route scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Scoping route; takes precedence over the service scope when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Whether the plugin is active on apply.
    pub enabled: bool,
    /// Execution priority within its phase; higher runs first.
    pub priority: i64,
    /// Plugin configuration.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub config: IndexMap<String, serde_json::Value>,
    /// Free-form tags; custom plugins carry `installation-pending` until
    /// their bundle is deployed to the gateway.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl PluginEntry {
    /// Creates an enabled plugin entry scoped to a service.
    #[must_use]
    pub fn on_service(
        name: impl Into<String>,
        service: impl Into<String>,
        priority: i64,
    ) -> Self {
        Self {
            name: name.into(),
            service: Some(service.into()),
            route: None,
            enabled: true,
            priority,
            config: IndexMap::new(),
            tags: Vec::new(),
        }
    }

    /// Sets the plugin configuration.
    #[must_use]
    pub fn with_config(mut self, config: IndexMap<String, serde_json::Value>) -> Self {
        self.config = config;
        self
    }

    /// Appends a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Returns the scope of this entry as a `(service, route)` pair.
    #[must_use]
    pub fn scope(&self) -> (Option<&str>, Option<&str>) {
        (self.service.as_deref(), self.route.as_deref())
    }
}
