//! Manual-remediation plan assembly.
//!
//! Every source of manual work contributes steps with fixed categories and
//! priorities, then the plan is sorted most-critical-first and renumbered.
//! The catalog is deterministic: the same inputs always produce the same
//! plan, which keeps reruns diffable.

use gatewright_gensvc::PluginArtifact;
use gatewright_model::policy::PolicyId;
use gatewright_model::steps::{sort_steps, ManualStep, StepCategory, StepPriority};
use gatewright_synth::DeckDocument;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File name used in deploy commands when the caller does not supply one.
pub const DEFAULT_CONFIG_FILE: &str = "kong.yaml";

/// A custom synthesis that produced no usable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisFailure {
    /// The policy whose plugin could not be generated.
    pub policy_id: PolicyId,
    /// The plugin name the document references.
    pub plugin_name: String,
    /// Why generation failed or its output was rejected.
    pub reason: String,
}

/// Everything the step catalog reads.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// The assembled document.
    pub document: &'a DeckDocument,
    /// Successfully generated plugin artifacts.
    pub artifacts: &'a [PluginArtifact],
    /// Custom syntheses that failed generation or shape validation.
    pub failures: &'a [SynthesisFailure],
    /// File name the document will be written to, used in commands.
    pub config_file: &'a str,
}

/// Assemble the ordered manual-remediation plan.
#[must_use]
pub fn assemble_steps(ctx: &StepContext<'_>) -> Vec<ManualStep> {
    let mut steps = Vec::new();

    for artifact in ctx.artifacts {
        steps.push(
            ManualStep::new(
                StepCategory::PluginDevelopment,
                StepPriority::Critical,
                format!("Install custom plugin '{}'", artifact.name),
                format!(
                    "Copy custom-plugins/{name}/ (handler.lua, schema.lua) onto every \
                     gateway node and enable it in the plugins list before applying the \
                     document. {notes}",
                    name = artifact.name,
                    notes = artifact.usage_notes
                ),
            )
            .with_command(format!("export KONG_PLUGINS=bundled,{}", artifact.name))
            .with_command("kong reload")
            .with_artifact(format!("custom-plugins/{}/handler.lua", artifact.name))
            .with_artifact(format!("custom-plugins/{}/schema.lua", artifact.name)),
        );
        steps.push(
            ManualStep::new(
                StepCategory::Testing,
                StepPriority::High,
                format!("Exercise custom plugin '{}'", artifact.name),
                format!(
                    "Replay representative traffic through routes that use '{}' and \
                     compare behavior against the source proxy before cutover.",
                    artifact.name
                ),
            )
            .with_artifact(artifact.name.clone()),
        );
    }

    for failure in ctx.failures {
        steps.push(
            ManualStep::new(
                StepCategory::PluginDevelopment,
                StepPriority::Critical,
                format!("Hand-write plugin '{}'", failure.plugin_name),
                format!(
                    "Generation for policy '{}' did not produce a usable plugin \
                     ({}); implement the behavior by hand before the document can \
                     go live.",
                    failure.policy_id, failure.reason
                ),
            )
            .with_artifact(failure.plugin_name.clone()),
        );
    }

    if document_uses_key_auth(ctx.document) {
        steps.push(
            ManualStep::new(
                StepCategory::Credentials,
                StepPriority::High,
                "Provision consumers and API keys",
                "key-auth rejects every request until consumers exist. Create one \
                 consumer per client application and issue its key before cutover; \
                 existing source-gateway keys do not carry over.",
            )
            .with_command("curl -X POST http://localhost:8001/consumers -d username=<client>")
            .with_command("curl -X POST http://localhost:8001/consumers/<client>/key-auth"),
        );
    }

    if ctx.document.plugins.iter().any(|p| p.name == "oauth2") {
        steps.push(ManualStep::new(
            StepCategory::Review,
            StepPriority::High,
            "Review OAuth scopes and token flows",
            "The oauth2 construct approximates the source policy. Verify grant \
             types, scopes and token lifetimes against the source configuration \
             before exposing the endpoint.",
        ));
    }

    if !ctx.document.is_empty() {
        steps.push(
            ManualStep::new(
                StepCategory::Deployment,
                StepPriority::Medium,
                "Validate the declarative config",
                "Run the offline validator against the generated document before \
                 touching the gateway.",
            )
            .with_command(format!("deck validate -s {}", ctx.config_file))
            .with_artifact(ctx.config_file.to_owned()),
        );
        steps.push(
            ManualStep::new(
                StepCategory::Deployment,
                StepPriority::Medium,
                "Apply the config to the gateway",
                "Sync the document once validation passes and every custom plugin \
                 is installed.",
            )
            .with_command(format!("deck sync -s {}", ctx.config_file)),
        );
        steps.push(ManualStep::new(
            StepCategory::Testing,
            StepPriority::Medium,
            "Run post-migration smoke tests",
            "Exercise every route end to end and compare status codes, headers \
             and rate-limit behavior with the source proxy.",
        ));
    }

    sort_steps(&mut steps);
    debug!(steps = steps.len(), "manual plan assembled");
    steps
}

/// True when the document authenticates with API keys, either as a
/// standalone key-auth entry or folded into a bundle's config.
fn document_uses_key_auth(document: &DeckDocument) -> bool {
    document
        .plugins
        .iter()
        .any(|p| p.name == "key-auth" || p.config.contains_key("key_names"))
}
