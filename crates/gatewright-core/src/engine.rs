//! The migration pipeline.
//!
//! [`MigrationEngine`] runs the stages in a fixed order: input validation,
//! bundling advice, bundle planning, classification, custom-plugin
//! synthesis, document synthesis, validation, manual-step assembly, and an
//! optional prose narrative. Stages communicate by value; one engine serves
//! concurrent runs because its only shared state (the mapping table) is
//! immutable behind an `Arc`.
//!
//! Generation-service failures never abort a run. Advisory failures fall
//! back to the greedy plan, synthesis failures fall back to local scaffolds
//! or manual steps, narrative failures drop the prose. Every fallback
//! leaves a warning in the package.

use crate::cancel::CancelSignal;
use crate::classify::{classify_proxy, Classification};
use crate::config::EngineConfig;
use crate::error::MigrationError;
use crate::normalize::validate_proxy;
use chrono::{DateTime, Utc};
use gatewright_bundling::BundlePlanner;
use gatewright_gensvc::{
    AdvisoryRequest, GenError, GenerationService, PluginArtifact, PluginContract, PluginRequest,
    PolicySummary, ReportRequest,
};
use gatewright_mapping::MappingTable;
use gatewright_model::{
    Bundle, BundlingAdvice, Confidence, CoverageReport, Disposition, DispositionKind, ManualStep,
    PolicyDescriptor, ProxyModel,
};
use gatewright_report::{
    assemble_steps, DocumentValidator, StepContext, SynthesisFailure, ValidationOutcome,
};
use gatewright_synth::{DeckDocument, SynthesisInput, SynthesisOutput, Synthesizer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use ulid::Ulid;

/// Unique identifier for one migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Ulid);

impl RunId {
    /// A fresh id, sortable by creation time.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPackage {
    /// The deployable declarative document.
    pub document: DeckDocument,
    /// Generated custom plugin code, scaffold fallbacks included.
    pub artifacts: Vec<PluginArtifact>,
    /// Custom syntheses that produced no usable artifact.
    pub synthesis_failures: Vec<SynthesisFailure>,
    /// Aggregated migration metrics.
    pub coverage: CoverageReport,
    /// Structural and semantic checks over the document.
    pub validation: ValidationOutcome,
    /// The ordered manual-remediation plan.
    pub manual_steps: Vec<ManualStep>,
    /// Prose summary from the generation service; never engine-authored.
    pub narrative: Option<String>,
    /// Non-fatal events accumulated across the run.
    pub warnings: Vec<String>,
    /// True when the generation service was needed but unavailable.
    pub degraded: bool,
}

/// A completed run: the input, every intermediate verdict, and the package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRun {
    /// Run identifier; stable across overrides of the same run.
    pub id: RunId,
    /// Name of the migrated proxy.
    pub proxy_name: String,
    /// When the pipeline started.
    pub started_at: DateTime<Utc>,
    /// When the package (or its latest revision) was finished.
    pub completed_at: DateTime<Utc>,
    /// The validated input, kept for overrides and audits.
    pub proxy: ProxyModel,
    /// Bundles the planner emitted.
    pub bundles: Vec<Bundle>,
    /// One verdict per policy, in flow order.
    pub dispositions: Vec<Disposition>,
    /// The deliverables.
    pub package: MigrationPackage,
}

/// Custom-plugin synthesis results, carried between pipeline stages.
#[derive(Debug, Clone, Default)]
pub(crate) struct CustomSynthesis {
    /// Artifacts that passed shape validation, plus local scaffolds.
    pub(crate) artifacts: Vec<PluginArtifact>,
    /// Items with no usable artifact; each becomes a critical manual step.
    pub(crate) failures: Vec<SynthesisFailure>,
    /// True when the generation service went unavailable mid-stage.
    pub(crate) degraded: bool,
}

/// Orchestrates migration runs over a shared mapping table and service.
pub struct MigrationEngine {
    table: Arc<MappingTable>,
    service: Arc<dyn GenerationService>,
    config: EngineConfig,
}

impl fmt::Debug for MigrationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationEngine")
            .field("table_rows", &self.table.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MigrationEngine {
    /// Create an engine over the builtin mapping table.
    #[must_use]
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self {
            table: Arc::new(MappingTable::builtin()),
            service,
            config: EngineConfig::default(),
        }
    }

    /// Replace the mapping table.
    #[must_use]
    pub fn with_table(mut self, table: Arc<MappingTable>) -> Self {
        self.table = table;
        self
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The engine's configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The mapping table runs are classified against.
    #[inline]
    #[must_use]
    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// Run the full pipeline over one proxy.
    ///
    /// # Errors
    /// Fatal conditions only ([`MigrationError::is_fatal`]); degradable
    /// failures complete the run and surface as package warnings.
    pub async fn migrate(&self, proxy: ProxyModel) -> Result<MigrationRun, MigrationError> {
        self.migrate_with_cancel(proxy, &CancelSignal::new()).await
    }

    /// Run the pipeline with a cancellation hook.
    ///
    /// The signal is checked between stages and between per-policy service
    /// calls; a cancelled run discards partial results.
    ///
    /// # Errors
    /// Same conditions as [`Self::migrate`], plus
    /// [`MigrationError::Cancelled`].
    pub async fn migrate_with_cancel(
        &self,
        proxy: ProxyModel,
        cancel: &CancelSignal,
    ) -> Result<MigrationRun, MigrationError> {
        let id = RunId::new();
        let started_at = Utc::now();
        info!(
            run = %id,
            proxy = %proxy.name,
            policies = proxy.policy_count(),
            "migration run started"
        );

        validate_proxy(&proxy)?;
        cancel.checkpoint()?;

        let mut warnings = Vec::new();
        let advice = self.request_advice(&proxy, &mut warnings).await;
        cancel.checkpoint()?;

        let planner = BundlePlanner::new(Arc::clone(&self.table));
        let plan = if advice.is_empty() {
            planner.plan(&proxy)
        } else {
            planner.plan_with_advice(&proxy, &advice)
        };
        warnings.extend(plan.warnings().iter().cloned());
        debug!(
            bundles = plan.bundles().len(),
            saved = plan.saved_constructs(),
            "bundle plan ready"
        );
        cancel.checkpoint()?;

        let baseline = Confidence::clamped(self.config.direct_confidence);
        let Classification {
            dispositions,
            notes,
        } = classify_proxy(&proxy, &self.table, &plan, &advice, baseline);
        for note in notes {
            if let Some(warning) = note.warning() {
                warnings.push(warning);
            }
        }
        cancel.checkpoint()?;

        let synthesis = self
            .synthesize_customs(&proxy, &dispositions, cancel, &mut warnings)
            .await?;
        let service_down = synthesis.degraded;
        cancel.checkpoint()?;

        let mut package =
            self.assemble_package(&proxy, &dispositions, plan.bundles(), synthesis, warnings)?;
        cancel.checkpoint()?;

        self.request_narrative(&proxy, &dispositions, &mut package, service_down)
            .await;

        let completed_at = Utc::now();
        info!(
            run = %id,
            coverage = package.coverage.coverage_percentage,
            plugins = package.document.plugins.len(),
            custom_artifacts = package.artifacts.len(),
            degraded = package.degraded,
            elapsed_ms = (completed_at - started_at).num_milliseconds(),
            "migration run completed"
        );

        Ok(MigrationRun {
            id,
            proxy_name: proxy.name.clone(),
            started_at,
            completed_at,
            proxy,
            bundles: plan.bundles().to_vec(),
            dispositions,
            package,
        })
    }

    /// Ask for bundling advice; any failure degrades to no advice.
    async fn request_advice(
        &self,
        proxy: &ProxyModel,
        warnings: &mut Vec<String>,
    ) -> BundlingAdvice {
        if !self.config.advisory_enabled {
            return BundlingAdvice::none();
        }
        match self.service.advise_bundling(self.advisory_request(proxy)).await {
            Ok(advice) => {
                debug!(
                    groups = advice.groups.len(),
                    confidences = advice.confidences.len(),
                    "bundling advice received"
                );
                advice
            }
            Err(err) => {
                warn!(error = %err, "bundling advisory failed; falling back to greedy");
                warnings.push(format!(
                    "bundling advisory failed ({err}); using the greedy plan"
                ));
                BundlingAdvice::none()
            }
        }
    }

    fn advisory_request(&self, proxy: &ProxyModel) -> AdvisoryRequest {
        let mut policies = Vec::with_capacity(proxy.policy_count());
        for flow in &proxy.flows {
            for policy in flow.ordered() {
                let mapping = self.table.lookup(&policy.policy_type);
                policies.push(PolicySummary {
                    id: policy.id.clone(),
                    policy_type: policy.policy_type.as_str().to_owned(),
                    phase: policy.phase,
                    flow_name: policy.flow_name.clone(),
                    order_index: policy.order_index,
                    target_construct: mapping.map(|m| m.target_construct.clone()),
                    bundle_eligible: mapping.is_some_and(|m| m.bundle_eligible),
                });
            }
        }
        AdvisoryRequest {
            proxy_name: proxy.name.clone(),
            policies,
        }
    }

    /// Generate plugin code for every custom disposition.
    ///
    /// Unknown types are requested too: the service may still produce a
    /// usable scaffold. Once the service reports itself unavailable, the
    /// current and all remaining items get local scaffold fallbacks.
    async fn synthesize_customs(
        &self,
        proxy: &ProxyModel,
        dispositions: &[Disposition],
        cancel: &CancelSignal,
        warnings: &mut Vec<String>,
    ) -> Result<CustomSynthesis, MigrationError> {
        let mut result = CustomSynthesis::default();
        let contract = PluginContract::default();

        for disposition in dispositions {
            if disposition.kind != DispositionKind::Custom {
                continue;
            }
            cancel.checkpoint()?;

            let policy = proxy.find_policy(&disposition.policy_id).ok_or_else(|| {
                MigrationError::Internal(format!(
                    "disposition references unknown policy '{}'",
                    disposition.policy_id
                ))
            })?;
            let construct = disposition.target_construct.clone().ok_or_else(|| {
                MigrationError::Internal(format!(
                    "custom disposition for '{}' carries no construct",
                    disposition.policy_id
                ))
            })?;

            if result.degraded {
                result.artifacts.push(Self::fallback_artifact(&construct, policy));
                continue;
            }

            let request = PluginRequest {
                construct_name: construct.clone(),
                source_type: policy.policy_type.as_str().to_owned(),
                source_policy_id: policy.id.clone(),
                raw_config: policy.raw_config.clone(),
                contract: contract.clone(),
                notes: self
                    .table
                    .lookup(&policy.policy_type)
                    .and_then(|m| m.notes.clone()),
            };

            match self.service.synthesize_plugin(request).await {
                Ok(artifact) if artifact.name != construct => {
                    let reason = format!(
                        "service returned an artifact named '{}' for requested plugin '{construct}'",
                        artifact.name
                    );
                    warn!(policy = %policy.id, %reason, "plugin synthesis rejected");
                    warnings.push(format!("plugin for '{}' rejected: {reason}", policy.id));
                    result.failures.push(SynthesisFailure {
                        policy_id: policy.id.clone(),
                        plugin_name: construct,
                        reason,
                    });
                }
                Ok(artifact) => match artifact.validate(&contract) {
                    Ok(()) => {
                        debug!(plugin = %artifact.name, "custom plugin generated");
                        result.artifacts.push(artifact);
                    }
                    Err(violations) => {
                        let err = MigrationError::GenerationOutputInvalid {
                            construct: construct.clone(),
                            violations,
                        };
                        warn!(policy = %policy.id, error = %err, "generated plugin rejected");
                        if let Some(warning) = err.warning() {
                            warnings.push(warning);
                        }
                        result.failures.push(SynthesisFailure {
                            policy_id: policy.id.clone(),
                            plugin_name: construct,
                            reason: err.to_string(),
                        });
                    }
                },
                Err(GenError::Unavailable { attempts, message }) => {
                    result.degraded = true;
                    let err = MigrationError::GenerationUnavailable {
                        attempts,
                        source: GenError::Unavailable { attempts, message },
                    };
                    warn!(error = %err, "generation service down; scaffolding remaining plugins");
                    if let Some(warning) = err.warning() {
                        warnings.push(warning);
                    }
                    result.artifacts.push(Self::fallback_artifact(&construct, policy));
                }
                Err(other) => {
                    warn!(policy = %policy.id, error = %other, "plugin synthesis failed");
                    warnings.push(format!(
                        "plugin synthesis for '{}' failed: {other}",
                        policy.id
                    ));
                    result.failures.push(SynthesisFailure {
                        policy_id: policy.id.clone(),
                        plugin_name: construct,
                        reason: other.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    fn fallback_artifact(construct: &str, policy: &PolicyDescriptor) -> PluginArtifact {
        PluginArtifact::fallback(
            construct,
            policy.policy_type.as_str(),
            &format!(
                "{} policy '{}' from flow '{}'",
                policy.policy_type, policy.id, policy.flow_name
            ),
        )
    }

    /// Synthesize the document, validate it, and assemble the plan.
    ///
    /// Shared with overrides, which re-runs everything downstream of
    /// classification after a disposition changes.
    pub(crate) fn assemble_package(
        &self,
        proxy: &ProxyModel,
        dispositions: &[Disposition],
        bundles: &[Bundle],
        synthesis: CustomSynthesis,
        mut warnings: Vec<String>,
    ) -> Result<MigrationPackage, MigrationError> {
        let synthesizer = Synthesizer::new(Arc::clone(&self.table))
            .with_priority_ceiling(self.config.priority_ceiling)
            .with_priority_step(self.config.priority_step);
        let SynthesisOutput { document, notes } = synthesizer.synthesize(&SynthesisInput {
            proxy,
            dispositions,
            bundles,
        })?;
        warnings.extend(notes);

        let coverage = CoverageReport::from_dispositions(dispositions);
        let validation = DocumentValidator::new().validate(&document, dispositions);
        if !validation.is_valid {
            warn!(errors = validation.errors.len(), "document failed validation");
        }
        let manual_steps = assemble_steps(&StepContext {
            document: &document,
            artifacts: &synthesis.artifacts,
            failures: &synthesis.failures,
            config_file: &self.config.config_file,
        });

        Ok(MigrationPackage {
            document,
            artifacts: synthesis.artifacts,
            synthesis_failures: synthesis.failures,
            coverage,
            validation,
            manual_steps,
            narrative: None,
            warnings,
            degraded: synthesis.degraded,
        })
    }

    /// Ask for the prose narrative and attach it to the package.
    ///
    /// Skipped when disabled or when the service already went down this
    /// run; never authored locally.
    async fn request_narrative(
        &self,
        proxy: &ProxyModel,
        dispositions: &[Disposition],
        package: &mut MigrationPackage,
        service_down: bool,
    ) {
        if !self.config.narrative_enabled {
            return;
        }
        if service_down {
            package
                .warnings
                .push("narrative skipped: generation service already unavailable".into());
            return;
        }

        let request = ReportRequest {
            proxy_name: proxy.name.clone(),
            coverage: package.coverage.clone(),
            dispositions: dispositions.to_vec(),
            warnings: package.warnings.clone(),
        };
        match self.service.draft_report(request).await {
            Ok(prose) if !prose.trim().is_empty() => {
                debug!(chars = prose.len(), "narrative received");
                package.narrative = Some(prose);
            }
            Ok(_) => {
                package.warnings.push(
                    "narrative service returned empty prose; package ships without a narrative"
                        .into(),
                );
            }
            Err(err) => {
                warn!(error = %err, "narrative request failed");
                if matches!(err, GenError::Unavailable { .. }) {
                    package.degraded = true;
                }
                package.warnings.push(format!(
                    "narrative unavailable ({err}); package ships without a narrative"
                ));
            }
        }
    }
}
