//! The policy-type mapping table.
//!
//! Three disjoint answers exist for any source type: it maps to a target
//! construct, the target gateway makes it redundant, or the table has never
//! heard of it. [`MappingTable::hit`] returns exactly one of the three so
//! classification cannot get the precedence wrong.

use crate::compat::{CompatPair, ConstructCompat};
use gatewright_model::PolicyType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Relative effort of migrating one policy type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    /// Config translates mechanically.
    Low,
    /// Config needs interpretation or review.
    Medium,
    /// Behavior must be re-implemented.
    High,
}

impl Effort {
    /// Stable label used in rationales and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the table: how a source type migrates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMapping {
    /// The source policy type this row covers.
    pub source_type: PolicyType,
    /// Target construct (plugin) name.
    pub target_construct: String,
    /// Whether policies of this type may join consolidation bundles.
    pub bundle_eligible: bool,
    /// Baseline migration effort.
    pub base_effort: Effort,
    /// True when extension code must be produced rather than config.
    pub requires_custom: bool,
    /// Free-form migration notes carried into rationales.
    pub notes: Option<String>,
}

/// Serialized table fragment, the TOML surface.
///
/// ```toml
/// [[mapping]]
/// source = "VerifyAPIKey"
/// construct = "key-auth"
/// bundle_eligible = true
/// effort = "low"
///
/// [[not_required]]
/// type = "StatisticsCollector"
/// reason = "analytics are built into the target gateway"
///
/// [[compatible]]
/// a = "key-auth"
/// b = "rate-limiting"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSpec {
    /// Mapping rows.
    #[serde(default)]
    pub mapping: Vec<MappingEntry>,
    /// Types the target gateway makes redundant.
    #[serde(default)]
    pub not_required: Vec<NativeEntry>,
    /// Declared compatible construct pairs.
    #[serde(default)]
    pub compatible: Vec<CompatPair>,
}

/// One `[[mapping]]` row as written in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Source policy type wire name.
    pub source: String,
    /// Target construct name.
    pub construct: String,
    /// Bundle eligibility; defaults to false.
    #[serde(default)]
    pub bundle_eligible: bool,
    /// Migration effort.
    pub effort: Effort,
    /// Extension code required; defaults to false.
    #[serde(default)]
    pub requires_custom: bool,
    /// Optional migration notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// One `[[not_required]]` row as written in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeEntry {
    /// Source policy type wire name.
    #[serde(rename = "type")]
    pub policy_type: String,
    /// Why nothing needs to be emitted.
    pub reason: String,
}

/// Errors loading or merging table fragments.
///
/// Implemented by hand because the `InvalidEntry` field named `source` is a
/// policy-type name, not an error cause, and `thiserror` has no way to opt a
/// field named `source` out of the error-source role.
#[derive(Debug)]
pub enum MappingError {
    /// The TOML could not be parsed.
    Parse(toml::de::Error),

    /// A row was structurally valid TOML but semantically unusable.
    InvalidEntry {
        /// Source type of the offending row.
        source: String,
        /// What was wrong.
        reason: String,
    },
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "mapping table parse failed: {err}"),
            Self::InvalidEntry { source, reason } => {
                write!(f, "mapping entry for '{source}' invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for MappingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidEntry { .. } => None,
        }
    }
}

impl From<toml::de::Error> for MappingError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err)
    }
}

/// The three possible answers for a source type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TableHit<'a> {
    /// The type maps to a target construct.
    Mapped(&'a TargetMapping),
    /// The target gateway handles this natively; the reason is attached.
    Native(&'a str),
    /// The table does not know this type.
    Unknown,
}

/// The loaded mapping table.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingTable {
    entries: IndexMap<PolicyType, TargetMapping>,
    native: IndexMap<PolicyType, String>,
    compat: ConstructCompat,
}

impl MappingTable {
    /// An empty table; every lookup is [`TableHit::Unknown`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: IndexMap::new(),
            native: IndexMap::new(),
            compat: ConstructCompat::new(),
        }
    }

    /// The builtin default table covering the common policy catalog.
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.merge(builtin_spec());
        table
    }

    /// Parse a table from a TOML document.
    ///
    /// # Errors
    /// Returns [`MappingError::Parse`] on malformed TOML and
    /// [`MappingError::InvalidEntry`] on rows with empty names.
    pub fn from_toml_str(toml_src: &str) -> Result<Self, MappingError> {
        let spec: TableSpec = toml::from_str(toml_src)?;
        Self::validate_spec(&spec)?;
        let mut table = Self::empty();
        table.merge(spec);
        Ok(table)
    }

    /// Merge a TOML fragment into this table. Rows override existing rows
    /// for the same source type; native entries and compatible pairs append.
    ///
    /// # Errors
    /// Same conditions as [`Self::from_toml_str`]; on error the table is
    /// left unchanged.
    pub fn merge_toml_str(&mut self, toml_src: &str) -> Result<(), MappingError> {
        let spec: TableSpec = toml::from_str(toml_src)?;
        Self::validate_spec(&spec)?;
        self.merge(spec);
        Ok(())
    }

    /// Merge an already-validated fragment.
    pub fn merge(&mut self, spec: TableSpec) {
        for entry in spec.mapping {
            let source_type = PolicyType::from(entry.source);
            let replaced = self
                .entries
                .insert(
                    source_type.clone(),
                    TargetMapping {
                        source_type: source_type.clone(),
                        target_construct: entry.construct,
                        bundle_eligible: entry.bundle_eligible,
                        base_effort: entry.effort,
                        requires_custom: entry.requires_custom,
                        notes: entry.notes,
                    },
                )
                .is_some();
            if replaced {
                debug!(source = %source_type, "mapping row overridden by merge");
            }
        }
        for native in spec.not_required {
            self.native
                .insert(PolicyType::from(native.policy_type), native.reason);
        }
        for pair in spec.compatible {
            self.compat.declare(pair.a, pair.b);
        }
    }

    fn validate_spec(spec: &TableSpec) -> Result<(), MappingError> {
        for entry in &spec.mapping {
            if entry.source.trim().is_empty() {
                return Err(MappingError::InvalidEntry {
                    source: entry.source.clone(),
                    reason: "source type name is empty".into(),
                });
            }
            if entry.construct.trim().is_empty() {
                return Err(MappingError::InvalidEntry {
                    source: entry.source.clone(),
                    reason: "target construct name is empty".into(),
                });
            }
        }
        for native in &spec.not_required {
            if native.policy_type.trim().is_empty() {
                return Err(MappingError::InvalidEntry {
                    source: native.policy_type.clone(),
                    reason: "not-required type name is empty".into(),
                });
            }
        }
        Ok(())
    }

    /// The single authoritative answer for a source type.
    #[must_use]
    pub fn hit(&self, policy_type: &PolicyType) -> TableHit<'_> {
        if let Some(reason) = self.native.get(policy_type) {
            return TableHit::Native(reason);
        }
        match self.entries.get(policy_type) {
            Some(mapping) => TableHit::Mapped(mapping),
            None => TableHit::Unknown,
        }
    }

    /// The mapping row for a type, when one exists.
    #[must_use]
    pub fn lookup(&self, policy_type: &PolicyType) -> Option<&TargetMapping> {
        self.entries.get(policy_type)
    }

    /// Whether two constructs may share a bundle.
    #[must_use]
    pub fn constructs_compatible(&self, a: &str, b: &str) -> bool {
        self.compat.allows(a, b)
    }

    /// Number of mapping rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no mapping rows are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of not-required types.
    #[must_use]
    pub fn native_len(&self) -> usize {
        self.native.len()
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn row(
    source: &str,
    construct: &str,
    bundle_eligible: bool,
    effort: Effort,
    requires_custom: bool,
    notes: &str,
) -> MappingEntry {
    MappingEntry {
        source: source.into(),
        construct: construct.into(),
        bundle_eligible,
        effort,
        requires_custom,
        notes: Some(notes.into()),
    }
}

fn native(policy_type: &str, reason: &str) -> NativeEntry {
    NativeEntry {
        policy_type: policy_type.into(),
        reason: reason.into(),
    }
}

/// The builtin policy catalog.
fn builtin_spec() -> TableSpec {
    TableSpec {
        mapping: vec![
            row(
                "VerifyAPIKey",
                "key-auth",
                true,
                Effort::Low,
                false,
                "direct equivalent; key names carry over",
            ),
            row(
                "Quota",
                "rate-limiting",
                true,
                Effort::Low,
                false,
                "interval quotas translate to rate-limiting windows",
            ),
            row(
                "SpikeArrest",
                "rate-limiting",
                true,
                Effort::Low,
                false,
                "burst rates translate to per-second/minute limits",
            ),
            row(
                "OAuthV2",
                "oauth2",
                false,
                Effort::Medium,
                false,
                "token endpoints and scopes need review after migration",
            ),
            row(
                "CORS",
                "cors",
                false,
                Effort::Low,
                false,
                "direct equivalent",
            ),
            row(
                "AssignMessage",
                "request-transformer",
                true,
                Effort::Medium,
                false,
                "header and body rewrites; adjacent rewrites merge",
            ),
            row(
                "ResponseCache",
                "proxy-cache",
                false,
                Effort::Low,
                false,
                "cache TTLs carry over",
            ),
            row(
                "MessageLogging",
                "file-log",
                false,
                Effort::Low,
                false,
                "log sink path must exist on the target nodes",
            ),
            row(
                "BasicAuthentication",
                "basic-auth",
                false,
                Effort::Low,
                false,
                "credentials must be provisioned separately",
            ),
            row(
                "XMLToJSON",
                "request-transformer",
                false,
                Effort::Medium,
                true,
                "payload conversion code must be produced",
            ),
            row(
                "JSONToXML",
                "response-transformer",
                false,
                Effort::Medium,
                true,
                "payload conversion code must be produced",
            ),
            row(
                "Javascript",
                "pre-function",
                false,
                Effort::High,
                true,
                "inline logic must be translated to Lua",
            ),
            row(
                "JavaCallout",
                "custom-plugin",
                false,
                Effort::High,
                true,
                "compiled callout must be rewritten as a plugin",
            ),
            row(
                "ServiceCallout",
                "http-service",
                false,
                Effort::Medium,
                true,
                "mid-flow callouts need a dedicated plugin",
            ),
            row(
                "JSONThreatProtection",
                "pre-function",
                false,
                Effort::Medium,
                true,
                "payload inspection is custom Lua",
            ),
            row(
                "XMLThreatProtection",
                "pre-function",
                false,
                Effort::Medium,
                true,
                "payload inspection is custom Lua",
            ),
        ],
        not_required: vec![
            native(
                "StatisticsCollector",
                "analytics are built into the target gateway",
            ),
            native(
                "AccessEntity",
                "entity lookups go through the target's datastore",
            ),
            native(
                "KeyValueMapOperations",
                "the target's native configuration store replaces key-value maps",
            ),
            native(
                "RaiseFault",
                "error responses are configured per route on the target",
            ),
            native(
                "FlowCallout",
                "shared flows have no counterpart; logic folds into plugins",
            ),
        ],
        compatible: vec![CompatPair {
            a: "key-auth".into(),
            b: "rate-limiting".into(),
        }],
    }
}
