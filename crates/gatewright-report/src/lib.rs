//! Validation and remediation reporting.
//!
//! The last analysis pass before packaging:
//!
//! - [`validation`]: structural and semantic checks over an assembled
//!   document, producing a [`ValidationOutcome`] of errors and warnings
//! - [`steps`]: the deterministic manual-step catalog, sorted by urgency

pub mod steps;
pub mod validation;

pub use steps::{assemble_steps, StepContext, SynthesisFailure, DEFAULT_CONFIG_FILE};
pub use validation::{DocumentValidator, IssueKind, ValidationIssue, ValidationOutcome};
