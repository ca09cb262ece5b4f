//! Per-policy migration verdicts.
//!
//! Classification emits exactly one [`Disposition`] per input policy. The
//! variant kinds are disjoint buckets; coverage arithmetic depends on that.

use crate::bundle::BundleId;
use crate::error::ModelError;
use crate::policy::PolicyId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a single policy migrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispositionKind {
    /// One policy, one native target construct.
    Direct,
    /// Member of a bundle that collapses into one shared construct.
    Bundled,
    /// Needs generated or hand-written extension code.
    Custom,
    /// The target gateway handles this natively; nothing to emit.
    NotRequired,
}

impl DispositionKind {
    /// Stable label used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Bundled => "bundled",
            Self::Custom => "custom",
            Self::NotRequired => "not-required",
        }
    }
}

impl fmt::Display for DispositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A migration confidence score, always within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    /// No confidence at all; used for unrecognized types.
    pub const ZERO: Self = Self(0.0);
    /// Full confidence.
    pub const FULL: Self = Self(1.0);
    /// Baseline for direct table-backed migrations.
    pub const DIRECT_BASELINE: Self = Self(0.9);

    /// Validate a score.
    ///
    /// # Errors
    /// Returns [`ModelError::ConfidenceOutOfRange`] for NaN or values
    /// outside `[0.0, 1.0]`.
    pub fn new(value: f64) -> Result<Self, ModelError> {
        if value.is_nan() || !(0.0..=1.0).contains(&value) {
            return Err(ModelError::ConfidenceOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// Clamp an untrusted score into range; NaN becomes zero.
    ///
    /// Callers that care whether clamping changed the value compare against
    /// the input and log.
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// The inner score.
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// The smaller of two scores.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// The migration verdict for one policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disposition {
    /// Policy this verdict applies to.
    pub policy_id: PolicyId,
    /// Migration bucket.
    pub kind: DispositionKind,
    /// Target construct name; `None` only for [`DispositionKind::NotRequired`].
    pub target_construct: Option<String>,
    /// Owning bundle; `Some` iff kind is [`DispositionKind::Bundled`].
    pub bundle_id: Option<BundleId>,
    /// Confidence in the verdict.
    pub confidence: Confidence,
    /// Human-readable justification; never empty.
    pub rationale: String,
}

impl Disposition {
    /// A one-to-one native migration.
    #[must_use]
    pub fn direct(
        policy_id: impl Into<PolicyId>,
        target_construct: impl Into<String>,
        confidence: Confidence,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            policy_id: policy_id.into(),
            kind: DispositionKind::Direct,
            target_construct: Some(target_construct.into()),
            bundle_id: None,
            confidence,
            rationale: rationale.into(),
        }
    }

    /// Membership in a consolidation bundle.
    #[must_use]
    pub fn bundled(
        policy_id: impl Into<PolicyId>,
        target_construct: impl Into<String>,
        bundle_id: BundleId,
        confidence: Confidence,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            policy_id: policy_id.into(),
            kind: DispositionKind::Bundled,
            target_construct: Some(target_construct.into()),
            bundle_id: Some(bundle_id),
            confidence,
            rationale: rationale.into(),
        }
    }

    /// Requires generated or hand-written extension code.
    #[must_use]
    pub fn custom(
        policy_id: impl Into<PolicyId>,
        target_construct: impl Into<String>,
        confidence: Confidence,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            policy_id: policy_id.into(),
            kind: DispositionKind::Custom,
            target_construct: Some(target_construct.into()),
            bundle_id: None,
            confidence,
            rationale: rationale.into(),
        }
    }

    /// Nothing to migrate; the target handles it natively.
    #[must_use]
    pub fn not_required(policy_id: impl Into<PolicyId>, rationale: impl Into<String>) -> Self {
        Self {
            policy_id: policy_id.into(),
            kind: DispositionKind::NotRequired,
            target_construct: None,
            bundle_id: None,
            confidence: Confidence::FULL,
            rationale: rationale.into(),
        }
    }

    /// Check the kind/field coherence rules.
    ///
    /// Used on externally-supplied revisions (manual overrides); dispositions
    /// built through the constructors above are coherent by construction.
    ///
    /// # Errors
    /// Returns [`ModelError::IncoherentDisposition`] naming the broken rule.
    pub fn validate(&self) -> Result<(), ModelError> {
        let fail = |reason: &str| {
            Err(ModelError::IncoherentDisposition {
                policy_id: self.policy_id.clone(),
                reason: reason.to_owned(),
            })
        };
        if self.rationale.trim().is_empty() {
            return fail("rationale must not be empty");
        }
        match self.kind {
            DispositionKind::NotRequired => {
                if self.target_construct.is_some() {
                    return fail("not-required carries no target construct");
                }
                if self.bundle_id.is_some() {
                    return fail("not-required carries no bundle id");
                }
            }
            DispositionKind::Bundled => {
                if self.target_construct.is_none() {
                    return fail("bundled requires a target construct");
                }
                if self.bundle_id.is_none() {
                    return fail("bundled requires a bundle id");
                }
            }
            DispositionKind::Direct | DispositionKind::Custom => {
                if self.target_construct.is_none() {
                    return fail("target construct required for this kind");
                }
                if self.bundle_id.is_some() {
                    return fail("bundle id only valid on bundled dispositions");
                }
            }
        }
        Ok(())
    }
}
