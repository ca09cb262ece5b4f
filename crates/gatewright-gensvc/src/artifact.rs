//! Generated plugin artifacts and their shape validation.
//!
//! The service's output is text; before anything downstream trusts it, the
//! handler must declare a real lifecycle entry point and the schema must
//! declare the plugin and a config block. Validation collects every
//! violation rather than stopping at the first, so one remediation step
//! can list them all.

use crate::protocol::PluginContract;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One generated custom plugin: handler, schema, usage notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginArtifact {
    /// Registered plugin name.
    pub name: String,
    /// Handler source (lifecycle hooks).
    pub handler_source: String,
    /// Schema source (name + config declaration).
    pub schema_source: String,
    /// Installation and porting notes for the migration engineer.
    pub usage_notes: String,
}

/// A single shape violation in a generated artifact.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactViolation {
    /// The handler source is missing or blank.
    #[error("handler source is empty")]
    EmptyHandler,

    /// The handler declares none of the contract's lifecycle phases.
    #[error("handler declares no lifecycle entry point ({phases})")]
    NoEntryPoint {
        /// The phases that would have been accepted.
        phases: String,
    },

    /// The schema source is missing or blank.
    #[error("schema source is empty")]
    EmptySchema,

    /// The schema never mentions the plugin's registered name.
    #[error("schema does not declare plugin name '{name}'")]
    SchemaLacksName {
        /// The expected name.
        name: String,
    },

    /// The schema declares no config block.
    #[error("schema declares no config fields block")]
    SchemaLacksConfig,

    /// The artifact's name is empty or not a usable construct name.
    #[error("plugin name '{name}' is not usable")]
    BadName {
        /// The offending name.
        name: String,
    },
}

impl PluginArtifact {
    /// Check the artifact against a contract, returning every violation.
    ///
    /// # Errors
    /// A non-empty list of [`ArtifactViolation`]s when the shape is wrong.
    pub fn validate(&self, contract: &PluginContract) -> Result<(), Vec<ArtifactViolation>> {
        let mut violations = Vec::new();

        if self.name.trim().is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            violations.push(ArtifactViolation::BadName {
                name: self.name.clone(),
            });
        }

        if self.handler_source.trim().is_empty() {
            violations.push(ArtifactViolation::EmptyHandler);
        } else if !contract
            .lifecycle_phases
            .iter()
            .any(|phase| has_entry_point(&self.handler_source, phase))
        {
            violations.push(ArtifactViolation::NoEntryPoint {
                phases: contract.lifecycle_phases.join(", "),
            });
        }

        if self.schema_source.trim().is_empty() {
            violations.push(ArtifactViolation::EmptySchema);
        } else {
            if !self.name.trim().is_empty() && !self.schema_source.contains(&self.name) {
                violations.push(ArtifactViolation::SchemaLacksName {
                    name: self.name.clone(),
                });
            }
            if !self.schema_source.contains("config") || !self.schema_source.contains("fields") {
                violations.push(ArtifactViolation::SchemaLacksConfig);
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Deterministic local scaffold, used when the service is down or its
    /// output failed validation. Always passes [`Self::validate`] against
    /// the default contract.
    #[must_use]
    pub fn fallback(name: &str, source_type: &str, summary: &str) -> Self {
        let handler_source = format!(
            r#"local kong = kong

local Plugin = {{
  PRIORITY = 1000,
  VERSION = "0.1.0",
}}

function Plugin:access(conf)
  -- TODO: port {source_type} behavior from the source proxy
  kong.log.debug("{name}: scaffold invoked, no behavior ported yet")
end

return Plugin
"#
        );
        let schema_source = format!(
            r#"local typedefs = require "kong.db.schema.typedefs"

return {{
  name = "{name}",
  fields = {{
    {{ protocols = typedefs.protocols_http }},
    {{ config = {{
        type = "record",
        fields = {{}},
      }},
    }},
  }},
}}
"#
        );
        let usage_notes = format!(
            "Scaffold for '{name}' replacing a {source_type} policy. {summary} \
             The handler carries no behavior yet; port the source logic before \
             deploying, then install the plugin directory on every gateway node."
        );
        Self {
            name: name.to_owned(),
            handler_source,
            schema_source,
            usage_notes,
        }
    }
}

/// Derive a registrable plugin name from a source policy id.
///
/// Lowercases, collapses every non-alphanumeric run to a single dash, and
/// prefixes `custom-` so generated plugins never collide with stock
/// constructs.
#[must_use]
pub fn derive_plugin_name(policy_id: &str) -> String {
    let mut slug = String::with_capacity(policy_id.len());
    let mut pending_dash = false;
    for c in policy_id.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        return "custom-policy".to_owned();
    }
    format!("custom-{slug}")
}

/// True when the handler declares `function <ident>:<phase>(` or
/// `function <ident>.<phase>(`.
fn has_entry_point(handler: &str, phase: &str) -> bool {
    if !phase.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
        return false;
    }
    let pattern = format!(r"function\s+[A-Za-z_][A-Za-z0-9_]*\s*[:.]\s*{phase}\s*\(");
    Regex::new(&pattern)
        .map(|re| re.is_match(handler))
        .unwrap_or(false)
}
