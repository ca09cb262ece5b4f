//! Validation errors raised by model constructors.

use crate::policy::PolicyId;
use thiserror::Error;

/// Errors produced when constructing or revising model values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// A bundle was constructed with no member policies.
    #[error("bundle requires at least one member policy")]
    EmptyBundle,

    /// A confidence score fell outside the closed `[0.0, 1.0]` interval.
    #[error("confidence {value} outside [0.0, 1.0]")]
    ConfidenceOutOfRange {
        /// The rejected value.
        value: f64,
    },

    /// A disposition's fields contradict its kind.
    #[error("disposition for policy '{policy_id}' is incoherent: {reason}")]
    IncoherentDisposition {
        /// Policy the disposition belongs to.
        policy_id: PolicyId,
        /// Which coherence rule was broken.
        reason: String,
    },
}
