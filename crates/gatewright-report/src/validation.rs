//! Declarative document validation.
//!
//! Structural checks catch documents that would not apply at all: a wrong
//! format header, duplicate plugin instances on one scope, references to
//! services or routes the document never declares, or a document that lost
//! its constructs entirely. The semantic check catches a consumer-scoped
//! construct that would reject every request because nothing authenticates
//! a consumer ahead of it.

use gatewright_model::disposition::{Disposition, DispositionKind};
use gatewright_synth::{DeckDocument, PluginEntry, FORMAT_VERSION, INSTALLATION_PENDING_TAG};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Constructs that authenticate a consumer.
const AUTH_CONSTRUCTS: [&str; 3] = ["key-auth", "basic-auth", "oauth2"];

/// What class of finding a validation issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// `_format_version` is missing or not the supported version.
    WrongFormatVersion,
    /// The document declares nothing despite migratable dispositions.
    EmptyDocument,
    /// The same plugin name appears twice on one scope.
    DuplicatePlugin,
    /// A plugin is scoped to a service the document does not declare.
    DanglingServiceRef,
    /// A plugin is scoped to a route the document does not declare.
    DanglingRouteRef,
    /// A consumer-scoped construct has no authentication ahead of it.
    UnprotectedConsumerScope,
    /// Generated plugin code is not yet installed on the gateway.
    PendingInstallation,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Finding class.
    pub kind: IssueKind,
    /// What is wrong, naming the entities involved.
    pub message: String,
    /// How to fix it, when the fix is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ValidationIssue {
    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            remediation: None,
        }
    }

    fn with_remediation(mut self, hint: impl Into<String>) -> Self {
        self.remediation = Some(hint.into());
        self
    }
}

/// The outcome of validating one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// True when no errors were found. Warnings do not affect validity.
    pub is_valid: bool,
    /// Findings that prevent a clean apply.
    pub errors: Vec<ValidationIssue>,
    /// Findings worth review that do not block the apply.
    pub warnings: Vec<ValidationIssue>,
}

/// Validates assembled documents before packaging.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentValidator;

impl DocumentValidator {
    /// Create a validator.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run every check against a document and the dispositions it was
    /// assembled from.
    #[must_use]
    pub fn validate(
        &self,
        document: &DeckDocument,
        dispositions: &[Disposition],
    ) -> ValidationOutcome {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_format_version(document, &mut errors);
        self.check_emptiness(document, dispositions, &mut errors);
        self.check_duplicates(document, &mut errors);
        self.check_scope_refs(document, &mut errors);
        self.check_consumer_scoping(document, &mut errors);
        self.check_pending_installations(document, &mut warnings);

        debug!(
            errors = errors.len(),
            warnings = warnings.len(),
            "document validated"
        );
        ValidationOutcome {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn check_format_version(&self, document: &DeckDocument, errors: &mut Vec<ValidationIssue>) {
        if document.format_version != FORMAT_VERSION {
            let found = if document.format_version.is_empty() {
                "missing".to_owned()
            } else {
                format!("'{}'", document.format_version)
            };
            errors.push(
                ValidationIssue::new(
                    IssueKind::WrongFormatVersion,
                    format!("document format version is {found}, expected '{FORMAT_VERSION}'"),
                )
                .with_remediation(format!("set _format_version to \"{FORMAT_VERSION}\"")),
            );
        }
    }

    fn check_emptiness(
        &self,
        document: &DeckDocument,
        dispositions: &[Disposition],
        errors: &mut Vec<ValidationIssue>,
    ) {
        let migratable = dispositions
            .iter()
            .filter(|d| d.kind != DispositionKind::NotRequired)
            .count();
        if document.is_empty() && !dispositions.is_empty() {
            errors.push(ValidationIssue::new(
                IssueKind::EmptyDocument,
                format!(
                    "document declares nothing despite {} classified policies",
                    dispositions.len()
                ),
            ));
        } else if migratable > 0 && document.plugins.is_empty() {
            errors.push(ValidationIssue::new(
                IssueKind::EmptyDocument,
                format!("{migratable} migratable dispositions produced no plugin entries"),
            ));
        }
    }

    fn check_duplicates(&self, document: &DeckDocument, errors: &mut Vec<ValidationIssue>) {
        let mut seen: HashSet<(&str, Option<&str>, Option<&str>)> = HashSet::new();
        let mut reported: HashSet<&str> = HashSet::new();
        for plugin in &document.plugins {
            let (service, route) = plugin.scope();
            if !seen.insert((plugin.name.as_str(), service, route))
                && reported.insert(plugin.name.as_str())
            {
                errors.push(
                    ValidationIssue::new(
                        IssueKind::DuplicatePlugin,
                        format!("plugin '{}' appears more than once on the same scope", plugin.name),
                    )
                    .with_remediation(
                        "consolidate the duplicate entries or scope one of them to a route",
                    ),
                );
            }
        }
    }

    fn check_scope_refs(&self, document: &DeckDocument, errors: &mut Vec<ValidationIssue>) {
        let services: HashSet<&str> =
            document.services.iter().map(|s| s.name.as_str()).collect();
        let routes: HashSet<&str> = document
            .services
            .iter()
            .flat_map(|s| s.routes.iter().map(|r| r.name.as_str()))
            .collect();

        for plugin in &document.plugins {
            if let Some(service) = plugin.service.as_deref() {
                if !services.contains(service) {
                    errors.push(ValidationIssue::new(
                        IssueKind::DanglingServiceRef,
                        format!(
                            "plugin '{}' is scoped to undeclared service '{service}'",
                            plugin.name
                        ),
                    ));
                }
            }
            if let Some(route) = plugin.route.as_deref() {
                if !routes.contains(route) {
                    errors.push(ValidationIssue::new(
                        IssueKind::DanglingRouteRef,
                        format!(
                            "plugin '{}' is scoped to undeclared route '{route}'",
                            plugin.name
                        ),
                    ));
                }
            }
        }
    }

    /// A consumer-scoped limiter needs an authentication construct running
    /// before it, otherwise no request ever carries a consumer identity.
    /// A bundle that folded an auth member in satisfies the requirement
    /// from inside the entry itself.
    fn check_consumer_scoping(&self, document: &DeckDocument, errors: &mut Vec<ValidationIssue>) {
        for plugin in &document.plugins {
            if !is_consumer_scoped(plugin) || embeds_auth(plugin) {
                continue;
            }
            let protected = document.plugins.iter().any(|other| {
                AUTH_CONSTRUCTS.contains(&other.name.as_str())
                    && other.scope() == plugin.scope()
                    && other.priority > plugin.priority
            });
            if !protected {
                errors.push(
                    ValidationIssue::new(
                        IssueKind::UnprotectedConsumerScope,
                        format!(
                            "'{}' limits by consumer but no authentication construct runs \
                             ahead of it on the same scope",
                            plugin.name
                        ),
                    )
                    .with_remediation(
                        "add an authentication plugin at a higher priority on the same \
                         scope, or drop the consumer scoping",
                    ),
                );
            }
        }
    }

    fn check_pending_installations(
        &self,
        document: &DeckDocument,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        for plugin in &document.plugins {
            if plugin.tags.iter().any(|t| t == INSTALLATION_PENDING_TAG) {
                warnings.push(
                    ValidationIssue::new(
                        IssueKind::PendingInstallation,
                        format!(
                            "custom plugin '{}' must be installed on the gateway before \
                             this document can be applied",
                            plugin.name
                        ),
                    )
                    .with_remediation(
                        "install the generated plugin code on every gateway node first",
                    ),
                );
            }
        }
    }
}

fn is_consumer_scoped(plugin: &PluginEntry) -> bool {
    plugin.name == "acl"
        || plugin.config.get("limit_by").and_then(Value::as_str) == Some("consumer")
}

fn embeds_auth(plugin: &PluginEntry) -> bool {
    plugin.config.contains_key("key_names")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewright_model::disposition::Confidence;
    use gatewright_synth::{RouteEntry, ServiceEntry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn service() -> ServiceEntry {
        let mut entry = ServiceEntry::with_defaults("orders-api", "https://orders.internal");
        entry.routes.push(RouteEntry {
            name: "orders-route".into(),
            paths: vec!["/orders".into()],
            methods: Vec::new(),
            strip_path: true,
        });
        entry
    }

    fn doc_with_plugins(plugins: Vec<PluginEntry>) -> DeckDocument {
        let mut doc = DeckDocument::new();
        doc.services.push(service());
        doc.plugins = plugins;
        doc
    }

    fn direct(id: &str, construct: &str) -> Disposition {
        Disposition::direct(id, construct, Confidence::DIRECT_BASELINE, "table hit")
    }

    #[test]
    fn clean_document_is_valid() {
        let doc = doc_with_plugins(vec![
            PluginEntry::on_service("key-auth", "orders-api", 1000),
            PluginEntry::on_service("cors", "orders-api", 990),
        ]);
        let dispositions = vec![direct("verify", "key-auth"), direct("cors", "cors")];
        let outcome = DocumentValidator::new().validate(&doc, &dispositions);
        assert!(outcome.is_valid);
        assert!(outcome.errors.is_empty());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn wrong_format_version_is_an_error() {
        let mut doc = doc_with_plugins(vec![PluginEntry::on_service("cors", "orders-api", 1000)]);
        doc.format_version = "1.1".into();
        let outcome = DocumentValidator::new().validate(&doc, &[direct("cors", "cors")]);
        assert!(!outcome.is_valid);
        assert_eq!(outcome.errors[0].kind, IssueKind::WrongFormatVersion);
    }

    #[test]
    fn duplicate_scope_is_reported_once() {
        let doc = doc_with_plugins(vec![
            PluginEntry::on_service("rate-limiting", "orders-api", 1000),
            PluginEntry::on_service("rate-limiting", "orders-api", 990),
            PluginEntry::on_service("rate-limiting", "orders-api", 980),
        ]);
        let outcome =
            DocumentValidator::new().validate(&doc, &[direct("quota", "rate-limiting")]);
        let dupes: Vec<_> = outcome
            .errors
            .iter()
            .filter(|e| e.kind == IssueKind::DuplicatePlugin)
            .collect();
        assert_eq!(dupes.len(), 1);
        assert!(dupes[0].remediation.is_some());
    }

    #[test]
    fn same_name_on_different_scopes_is_fine() {
        let mut on_route = PluginEntry::on_service("rate-limiting", "orders-api", 990);
        on_route.route = Some("orders-route".into());
        let doc = doc_with_plugins(vec![
            PluginEntry::on_service("rate-limiting", "orders-api", 1000),
            on_route,
        ]);
        let outcome =
            DocumentValidator::new().validate(&doc, &[direct("quota", "rate-limiting")]);
        assert!(outcome
            .errors
            .iter()
            .all(|e| e.kind != IssueKind::DuplicatePlugin));
    }

    #[test]
    fn dangling_refs_are_errors() {
        let mut ghost_route = PluginEntry::on_service("cors", "orders-api", 990);
        ghost_route.route = Some("missing-route".into());
        let doc = doc_with_plugins(vec![
            PluginEntry::on_service("key-auth", "ghost-service", 1000),
            ghost_route,
        ]);
        let outcome = DocumentValidator::new().validate(&doc, &[direct("cors", "cors")]);
        assert!(outcome
            .errors
            .iter()
            .any(|e| e.kind == IssueKind::DanglingServiceRef));
        assert!(outcome
            .errors
            .iter()
            .any(|e| e.kind == IssueKind::DanglingRouteRef));
    }

    #[test]
    fn consumer_scoped_limiter_needs_upstream_auth() {
        let limiter = PluginEntry::on_service("rate-limiting", "orders-api", 1000).with_config(
            [("limit_by".to_owned(), json!("consumer"))]
                .into_iter()
                .collect(),
        );
        let doc = doc_with_plugins(vec![limiter]);
        let outcome =
            DocumentValidator::new().validate(&doc, &[direct("quota", "rate-limiting")]);
        assert!(!outcome.is_valid);
        let issue = outcome
            .errors
            .iter()
            .find(|e| e.kind == IssueKind::UnprotectedConsumerScope)
            .unwrap();
        assert!(issue.remediation.is_some());
    }

    #[test]
    fn higher_priority_auth_satisfies_consumer_scoping() {
        let limiter = PluginEntry::on_service("rate-limiting", "orders-api", 990).with_config(
            [("limit_by".to_owned(), json!("consumer"))]
                .into_iter()
                .collect(),
        );
        let doc = doc_with_plugins(vec![
            PluginEntry::on_service("key-auth", "orders-api", 1000),
            limiter,
        ]);
        let outcome =
            DocumentValidator::new().validate(&doc, &[direct("quota", "rate-limiting")]);
        assert!(outcome.is_valid);
    }

    #[test]
    fn embedded_auth_satisfies_consumer_scoping() {
        // a bundle that folded key-auth in carries its key_names
        let bundled = PluginEntry::on_service("rate-limiting", "orders-api", 1000).with_config(
            [
                ("limit_by".to_owned(), json!("consumer")),
                ("key_names".to_owned(), json!(["apikey"])),
            ]
            .into_iter()
            .collect(),
        );
        let doc = doc_with_plugins(vec![bundled]);
        let outcome =
            DocumentValidator::new().validate(&doc, &[direct("quota", "rate-limiting")]);
        assert!(outcome.is_valid);
    }

    #[test]
    fn pending_installation_warns_without_invalidating() {
        let doc = doc_with_plugins(vec![PluginEntry::on_service(
            "custom-ldap",
            "orders-api",
            1000,
        )
        .with_tag("custom-plugin")
        .with_tag(INSTALLATION_PENDING_TAG)]);
        let outcome =
            DocumentValidator::new().validate(&doc, &[direct("ldap", "custom-ldap")]);
        assert!(outcome.is_valid);
        assert_eq!(outcome.warnings[0].kind, IssueKind::PendingInstallation);
    }

    #[test]
    fn empty_document_with_dispositions_is_an_error() {
        let doc = DeckDocument::new();
        let outcome = DocumentValidator::new().validate(&doc, &[direct("cors", "cors")]);
        assert!(!outcome.is_valid);
        assert_eq!(outcome.errors[0].kind, IssueKind::EmptyDocument);
    }

    #[test]
    fn all_not_required_document_is_valid_without_plugins() {
        let mut doc = DeckDocument::new();
        doc.services.push(service());
        let dispositions = vec![Disposition::not_required("analytics", "built in")];
        let outcome = DocumentValidator::new().validate(&doc, &dispositions);
        assert!(outcome.is_valid);
    }
}
