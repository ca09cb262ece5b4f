//! Document assembly.
//!
//! Walks the proxy's flows in execution order and emits one plugin entry per
//! Direct disposition, one per bundle (at its first member's position), and
//! one placeholder entry per Custom disposition. NotRequired policies emit
//! nothing. Priorities strictly decrease within each phase so the source
//! policy order survives in the rendered document.

use crate::document::{DeckDocument, PluginEntry, ServiceEntry};
use crate::translate::{merge_configs, translate_config, PluginConfig};
use gatewright_mapping::{MappingTable, TableHit};
use gatewright_model::bundle::{Bundle, BundleId};
use gatewright_model::disposition::{Disposition, DispositionKind};
use gatewright_model::policy::{ExecutionPhase, PolicyDescriptor, PolicyId};
use gatewright_model::proxy::ProxyModel;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Default highest plugin priority within a phase.
pub const DEFAULT_PRIORITY_CEILING: i64 = 1000;

/// Default gap between consecutive plugin priorities.
pub const DEFAULT_PRIORITY_STEP: i64 = 10;

/// Constructs that authenticate a consumer.
const AUTH_CONSTRUCTS: [&str; 3] = ["key-auth", "basic-auth", "oauth2"];

/// Tag carried by generated plugin entries until the code is deployed.
pub const INSTALLATION_PENDING_TAG: &str = "installation-pending";

/// Failures assembling a document. All of them indicate inconsistent input
/// from an earlier stage; a validated run never hits them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthError {
    /// A disposition names a policy the proxy does not contain.
    #[error("disposition references unknown policy '{policy_id}'")]
    UnknownPolicy {
        /// The offending id.
        policy_id: PolicyId,
    },

    /// A policy reached synthesis without a disposition.
    #[error("policy '{policy_id}' has no disposition")]
    MissingDisposition {
        /// The undisposed policy.
        policy_id: PolicyId,
    },

    /// A bundled disposition references a bundle that was not supplied.
    #[error("disposition for '{policy_id}' references unknown bundle {bundle_id}")]
    UnknownBundle {
        /// The member policy.
        policy_id: PolicyId,
        /// The missing bundle.
        bundle_id: BundleId,
    },

    /// A disposition's fields contradict its kind.
    #[error("disposition for '{policy_id}' is incoherent: {reason}")]
    Incoherent {
        /// The offending policy.
        policy_id: PolicyId,
        /// The broken coherence rule.
        reason: String,
    },
}

/// Everything document assembly reads.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    /// The normalized proxy.
    pub proxy: &'a ProxyModel,
    /// One verdict per policy.
    pub dispositions: &'a [Disposition],
    /// Bundles the verdicts reference.
    pub bundles: &'a [Bundle],
}

/// An assembled document plus translation caveats.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    /// The deployable document.
    pub document: DeckDocument,
    /// Caveats raised while translating configs, prefixed with the policy id.
    pub notes: Vec<String>,
}

/// Assembles declarative documents from classified proxies.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    table: Arc<MappingTable>,
    priority_ceiling: i64,
    priority_step: i64,
}

impl Synthesizer {
    /// Create a synthesizer over the given mapping table.
    #[must_use]
    pub fn new(table: Arc<MappingTable>) -> Self {
        Self {
            table,
            priority_ceiling: DEFAULT_PRIORITY_CEILING,
            priority_step: DEFAULT_PRIORITY_STEP,
        }
    }

    /// Override the per-phase priority ceiling.
    #[must_use]
    pub fn with_priority_ceiling(mut self, ceiling: i64) -> Self {
        self.priority_ceiling = ceiling;
        self
    }

    /// Override the gap between consecutive priorities. Values below 1 are
    /// raised to 1 to keep priorities strictly decreasing.
    #[must_use]
    pub fn with_priority_step(mut self, step: i64) -> Self {
        self.priority_step = step.max(1);
        self
    }

    /// Build the declarative document for a classified proxy.
    ///
    /// # Errors
    ///
    /// Fails only on inconsistent input: a policy without a disposition, a
    /// disposition for a policy the proxy lacks, a dangling bundle
    /// reference, or an incoherent disposition.
    pub fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<SynthesisOutput, SynthError> {
        let dispositions: HashMap<&PolicyId, &Disposition> = input
            .dispositions
            .iter()
            .map(|d| (&d.policy_id, d))
            .collect();
        let bundles: HashMap<BundleId, &Bundle> =
            input.bundles.iter().map(|b| (b.id(), b)).collect();

        for disposition in input.dispositions {
            if input.proxy.find_policy(&disposition.policy_id).is_none() {
                return Err(SynthError::UnknownPolicy {
                    policy_id: disposition.policy_id.clone(),
                });
            }
        }

        let mut document = DeckDocument::new();
        document.services.push(ServiceEntry::from_proxy(input.proxy));
        let service_name = input.proxy.upstream.name.clone();

        let mut notes = Vec::new();
        let mut emitted_bundles: HashSet<BundleId> = HashSet::new();
        // One counter per phase keeps priorities strictly decreasing within
        // a phase while phases stay independent of each other.
        let mut slots_used = [0_i64; 3];

        for flow in &input.proxy.flows {
            for policy in flow.ordered() {
                let disposition = dispositions.get(&policy.id).copied().ok_or_else(|| {
                    SynthError::MissingDisposition {
                        policy_id: policy.id.clone(),
                    }
                })?;

                match disposition.kind {
                    DispositionKind::NotRequired => {
                        debug!(policy = %policy.id, "nothing emitted for not-required policy");
                    }
                    DispositionKind::Direct => {
                        let construct = require_construct(disposition)?;
                        let priority = self.next_priority(&mut slots_used, policy.phase);
                        let translation = translate_config(construct, policy);
                        push_notes(&mut notes, &policy.id, translation.notes);
                        document.plugins.push(
                            PluginEntry::on_service(construct, &service_name, priority)
                                .with_config(translation.config),
                        );
                    }
                    DispositionKind::Bundled => {
                        let bundle_id = disposition.bundle_id.ok_or_else(|| {
                            SynthError::Incoherent {
                                policy_id: policy.id.clone(),
                                reason: "bundled disposition lacks a bundle id".to_owned(),
                            }
                        })?;
                        if !emitted_bundles.insert(bundle_id) {
                            continue;
                        }
                        let bundle =
                            bundles
                                .get(&bundle_id)
                                .copied()
                                .ok_or(SynthError::UnknownBundle {
                                    policy_id: policy.id.clone(),
                                    bundle_id,
                                })?;
                        let priority = self.next_priority(&mut slots_used, policy.phase);
                        let entry = self.bundle_entry(
                            input.proxy,
                            bundle,
                            &service_name,
                            priority,
                            &mut notes,
                        )?;
                        document.plugins.push(entry);
                    }
                    DispositionKind::Custom => {
                        let construct = require_construct(disposition)?;
                        let priority = self.next_priority(&mut slots_used, policy.phase);
                        document.plugins.push(
                            PluginEntry::on_service(construct, &service_name, priority)
                                .with_tag("custom-plugin")
                                .with_tag(INSTALLATION_PENDING_TAG),
                        );
                    }
                }
            }
        }

        debug!(
            services = document.services.len(),
            plugins = document.plugins.len(),
            "document assembled"
        );
        Ok(SynthesisOutput { document, notes })
    }

    /// One plugin entry for a whole bundle: member configs fold together in
    /// member order, so the representative (last) member's settings win on
    /// conflicts. A folded-in auth member turns on consumer-scoped limiting.
    fn bundle_entry(
        &self,
        proxy: &ProxyModel,
        bundle: &Bundle,
        service_name: &str,
        priority: i64,
        notes: &mut Vec<String>,
    ) -> Result<PluginEntry, SynthError> {
        let mut config = PluginConfig::new();
        let mut has_auth_member = false;

        for member_id in bundle.member_policy_ids() {
            let member = proxy
                .find_policy(member_id)
                .ok_or_else(|| SynthError::UnknownPolicy {
                    policy_id: member_id.clone(),
                })?;
            let Some(construct) = self.member_construct(member) else {
                continue;
            };
            if AUTH_CONSTRUCTS.contains(&construct.as_str()) {
                has_auth_member = true;
            }
            let translation = translate_config(&construct, member);
            push_notes(notes, member_id, translation.notes);
            merge_configs(&mut config, translation.config);
        }

        if has_auth_member && bundle.target_construct() == "rate-limiting" {
            config.insert("limit_by".to_owned(), json!("consumer"));
        }

        Ok(
            PluginEntry::on_service(bundle.target_construct(), service_name, priority)
                .with_config(config),
        )
    }

    /// The construct a bundle member would have migrated to on its own.
    fn member_construct(&self, member: &PolicyDescriptor) -> Option<String> {
        match self.table.hit(&member.policy_type) {
            TableHit::Mapped(mapping) => Some(mapping.target_construct.clone()),
            TableHit::Native(_) | TableHit::Unknown => None,
        }
    }

    fn next_priority(&self, slots_used: &mut [i64; 3], phase: ExecutionPhase) -> i64 {
        let slot = &mut slots_used[phase_slot(phase)];
        let priority = self.priority_ceiling - self.priority_step * *slot;
        *slot += 1;
        priority
    }
}

fn phase_slot(phase: ExecutionPhase) -> usize {
    match phase {
        ExecutionPhase::PreRequest => 0,
        ExecutionPhase::PostRequest => 1,
        ExecutionPhase::Error => 2,
    }
}

fn require_construct(disposition: &Disposition) -> Result<&str, SynthError> {
    disposition
        .target_construct
        .as_deref()
        .ok_or_else(|| SynthError::Incoherent {
            policy_id: disposition.policy_id.clone(),
            reason: format!("{} disposition lacks a target construct", disposition.kind),
        })
}

fn push_notes(notes: &mut Vec<String>, policy_id: &PolicyId, raised: Vec<String>) {
    for note in raised {
        notes.push(format!("{policy_id}: {note}"));
    }
}
