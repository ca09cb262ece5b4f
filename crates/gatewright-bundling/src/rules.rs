//! The hard consolidation rules.
//!
//! A group is admitted as a whole or not at all; [`RuleSet::validate_group`]
//! reports the first violation it finds. The same rules gate both the
//! greedy walk and advisory proposals, so there is exactly one notion of
//! "legal bundle" in the system.

use gatewright_mapping::{MappingTable, TableHit, TargetMapping};
use gatewright_model::{ExecutionPhase, PolicyDescriptor, PolicyId};
use indexmap::IndexMap;
use thiserror::Error;

/// Why a candidate group cannot become a bundle.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleViolation {
    /// A member's type is not bundle-eligible under the table.
    #[error("policy '{policy_id}' ({policy_type}) is not bundle-eligible")]
    NotEligible {
        /// The ineligible member.
        policy_id: PolicyId,
        /// Its source type.
        policy_type: String,
    },

    /// A member's type has no mapping row at all.
    #[error("policy '{policy_id}' has no target mapping and cannot bundle")]
    Unmapped {
        /// The unmapped member.
        policy_id: PolicyId,
    },

    /// Members span more than one execution phase.
    #[error("policy '{policy_id}' runs in {found} but the group runs in {expected}")]
    PhaseMismatch {
        /// The offending member.
        policy_id: PolicyId,
        /// The group's phase.
        expected: ExecutionPhase,
        /// The member's phase.
        found: ExecutionPhase,
    },

    /// A member depends on an outside policy executing inside the group's
    /// order span, so merging would reorder effects.
    #[error("policy '{policy_id}' depends on '{depends_on}', which executes inside the group but is not a member")]
    InterveningDependency {
        /// The dependent member.
        policy_id: PolicyId,
        /// The outside dependency.
        depends_on: PolicyId,
    },

    /// Two member constructs are neither identical nor declared compatible.
    #[error("constructs '{a}' and '{b}' are not compatible")]
    IncompatibleConstructs {
        /// First construct.
        a: String,
        /// Second construct.
        b: String,
    },

    /// An advisory group referenced a policy id absent from the run.
    #[error("proposed member '{policy_id}' does not exist in this run")]
    UnknownMember {
        /// The missing id.
        policy_id: PolicyId,
    },

    /// An advisory group claimed a policy that another group already holds.
    #[error("policy '{policy_id}' already belongs to another proposed group")]
    DuplicateMembership {
        /// The doubly-claimed id.
        policy_id: PolicyId,
    },

    /// A group needs at least two members to be worth emitting.
    #[error("group of {size} member(s) is too small to bundle")]
    TooSmall {
        /// Proposed size.
        size: usize,
    },
}

/// Id-addressable view over every policy in the run.
///
/// Dependency targets may live in other flows, so rule checks need
/// run-wide lookup rather than per-flow lookup.
#[derive(Debug)]
pub struct PolicyIndex<'a> {
    by_id: IndexMap<&'a PolicyId, &'a PolicyDescriptor>,
}

impl<'a> PolicyIndex<'a> {
    /// Index policies from any iterator of descriptors.
    #[must_use]
    pub fn build(policies: impl IntoIterator<Item = &'a PolicyDescriptor>) -> Self {
        let mut by_id = IndexMap::new();
        for p in policies {
            by_id.insert(&p.id, p);
        }
        Self { by_id }
    }

    /// Look up a policy by id.
    #[must_use]
    pub fn get(&self, id: &PolicyId) -> Option<&'a PolicyDescriptor> {
        self.by_id.get(id).copied()
    }

    /// Number of indexed policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// The rule evaluator for one run.
#[derive(Debug)]
pub struct RuleSet<'a> {
    table: &'a MappingTable,
    index: &'a PolicyIndex<'a>,
}

impl<'a> RuleSet<'a> {
    /// Bind the rules to a table and a run's policy index.
    #[must_use]
    pub fn new(table: &'a MappingTable, index: &'a PolicyIndex<'a>) -> Self {
        Self { table, index }
    }

    /// The mapping row for a policy, provided it may join bundles.
    ///
    /// # Errors
    /// [`RuleViolation::Unmapped`] when the table does not map the type,
    /// [`RuleViolation::NotEligible`] when it maps but may not bundle.
    pub fn eligibility(&self, policy: &PolicyDescriptor) -> Result<&'a TargetMapping, RuleViolation> {
        match self.table.hit(&policy.policy_type) {
            TableHit::Mapped(mapping) if mapping.bundle_eligible => Ok(mapping),
            TableHit::Mapped(_) => Err(RuleViolation::NotEligible {
                policy_id: policy.id.clone(),
                policy_type: policy.policy_type.as_str().to_owned(),
            }),
            TableHit::Native(_) | TableHit::Unknown => Err(RuleViolation::Unmapped {
                policy_id: policy.id.clone(),
            }),
        }
    }

    /// Validate a whole candidate group against every hard rule.
    ///
    /// Returns the construct the group would collapse into: the construct
    /// of the last member in execution order, which for mixed compatible
    /// pairs is the construct that absorbs the others' behavior.
    ///
    /// # Errors
    /// The first [`RuleViolation`] encountered, checking eligibility, then
    /// phase, then dependency closure, then construct compatibility.
    pub fn validate_group(
        &self,
        members: &[&PolicyDescriptor],
        min_size: usize,
    ) -> Result<String, RuleViolation> {
        if members.len() < min_size {
            return Err(RuleViolation::TooSmall {
                size: members.len(),
            });
        }

        let mut mappings = Vec::with_capacity(members.len());
        for member in members {
            mappings.push(self.eligibility(member)?);
        }

        let phase = members[0].phase;
        for member in &members[1..] {
            if member.phase != phase {
                return Err(RuleViolation::PhaseMismatch {
                    policy_id: member.id.clone(),
                    expected: phase,
                    found: member.phase,
                });
            }
        }

        self.check_dependency_closure(members, phase)?;

        // Pairwise compatibility; each declared allowance is explicit, so
        // transitivity is not assumed.
        for (i, left) in mappings.iter().enumerate() {
            for right in &mappings[i + 1..] {
                if !self
                    .table
                    .constructs_compatible(&left.target_construct, &right.target_construct)
                {
                    return Err(RuleViolation::IncompatibleConstructs {
                        a: left.target_construct.clone(),
                        b: right.target_construct.clone(),
                    });
                }
            }
        }

        let representative = mappings
            .last()
            .map(|m| m.target_construct.clone())
            .unwrap_or_default();
        Ok(representative)
    }

    /// Rule (c): no member may depend on an outside policy that executes
    /// within the group's order span in the same phase.
    fn check_dependency_closure(
        &self,
        members: &[&PolicyDescriptor],
        phase: ExecutionPhase,
    ) -> Result<(), RuleViolation> {
        let first = members.iter().map(|m| m.order_index).min().unwrap_or(0);
        let last = members.iter().map(|m| m.order_index).max().unwrap_or(0);
        let is_member = |id: &PolicyId| members.iter().any(|m| &m.id == id);

        for member in members {
            for dep in &member.depends_on {
                if is_member(dep) {
                    continue;
                }
                // Dependencies on policies the run does not know are an
                // input-validation concern, not a bundling one.
                let Some(target) = self.index.get(dep) else {
                    continue;
                };
                if target.phase == phase && target.order_index > first && target.order_index < last
                {
                    return Err(RuleViolation::InterveningDependency {
                        policy_id: member.id.clone(),
                        depends_on: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
