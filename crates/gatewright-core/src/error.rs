//! The run-level error model.
//!
//! Variants split into fatal (the run cannot produce a package) and
//! non-fatal (a stage degrades and the run completes with a warning).
//! [`MigrationError::warning`] bridges the non-fatal kinds into the
//! package's warning list.

use gatewright_gensvc::{ArtifactViolation, GenError};
use gatewright_model::{BundleId, PolicyId};
use gatewright_synth::SynthError;
use thiserror::Error;

/// Errors raised while executing or revising a migration run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MigrationError {
    /// The input proxy, or an override request against it, is structurally
    /// unusable.
    #[error("policy '{policy_id}': malformed {field}: {reason}")]
    InputMalformed {
        /// Policy the defect was found on.
        policy_id: PolicyId,
        /// Offending field.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The mapping table has never heard of this policy type.
    #[error("policy '{policy_id}' has unrecognized type '{type_name}'")]
    UnknownPolicyType {
        /// Policy carrying the unknown type.
        policy_id: PolicyId,
        /// The wire name as received.
        type_name: String,
    },

    /// The generation service could not be reached within its retry budget.
    #[error("generation service unavailable after {attempts} attempt(s)")]
    GenerationUnavailable {
        /// Attempts made before giving up.
        attempts: u32,
        /// The terminal service error.
        #[source]
        source: GenError,
    },

    /// Generated plugin code failed shape validation.
    #[error("generated code for '{construct}' violates the plugin contract: {} issue(s)", .violations.len())]
    GenerationOutputInvalid {
        /// The plugin the code was generated for.
        construct: String,
        /// Every rule the artifact broke.
        violations: Vec<ArtifactViolation>,
    },

    /// A revision would break a bundle invariant.
    #[error("bundle invariant broken for policy '{policy_id}' in bundle {bundle_id}: {invariant}")]
    BundleInvariantViolation {
        /// The invariant that would be broken.
        invariant: String,
        /// Affected bundle.
        bundle_id: BundleId,
        /// Policy whose revision was rejected.
        policy_id: PolicyId,
    },

    /// The run was cancelled cooperatively.
    #[error("migration run cancelled")]
    Cancelled,

    /// A stage broke its contract; always a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MigrationError {
    /// Whether the run (or the override request) must stop here.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InputMalformed { .. }
            | Self::BundleInvariantViolation { .. }
            | Self::Cancelled
            | Self::Internal(_) => true,
            Self::UnknownPolicyType { .. }
            | Self::GenerationUnavailable { .. }
            | Self::GenerationOutputInvalid { .. } => false,
        }
    }

    /// A user-facing hint on how to proceed.
    #[must_use]
    pub fn remediation(&self) -> String {
        match self {
            Self::InputMalformed { field, .. } => {
                format!("fix the '{field}' field in the source proxy export and re-run")
            }
            Self::UnknownPolicyType { type_name, .. } => {
                format!("add a mapping-table entry for '{type_name}' or migrate the policy by hand")
            }
            Self::GenerationUnavailable { .. } => {
                "re-run with the generation service reachable, or keep the scaffold fallbacks"
                    .into()
            }
            Self::GenerationOutputInvalid { construct, .. } => {
                format!("hand-write the '{construct}' plugin; the generated code was rejected")
            }
            Self::BundleInvariantViolation { .. } => {
                "reclassify every member of the bundle together, or leave the bundle intact".into()
            }
            Self::Cancelled => "re-run the migration".into(),
            Self::Internal(_) => "file a bug with the run input attached".into(),
        }
    }

    /// Render a non-fatal error as a run warning; fatal kinds return `None`.
    #[must_use]
    pub fn warning(&self) -> Option<String> {
        if self.is_fatal() {
            return None;
        }
        Some(format!("{self} ({})", self.remediation()))
    }
}

impl From<SynthError> for MigrationError {
    fn from(err: SynthError) -> Self {
        Self::Internal(err.to_string())
    }
}
