//! Advisory input from the generation service.
//!
//! Advice is untrusted: groups must survive the planner's hard rules and
//! confidences are clamped before use. Losing or ignoring advice is always
//! legal; the pipeline must produce the same shape of result without it.

use crate::policy::PolicyId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One proposed consolidation group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryGroup {
    /// Proposed members, any order.
    pub policy_ids: Vec<PolicyId>,
    /// Why the service thinks these merge.
    pub rationale: String,
}

impl AdvisoryGroup {
    /// Create a group proposal.
    #[must_use]
    pub fn new(policy_ids: Vec<PolicyId>, rationale: impl Into<String>) -> Self {
        Self {
            policy_ids,
            rationale: rationale.into(),
        }
    }
}

/// Everything the generation service offers about bundling and confidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundlingAdvice {
    /// Proposed groups; each is validated before adoption.
    #[serde(default)]
    pub groups: Vec<AdvisoryGroup>,
    /// Per-policy migration confidence overrides, unclamped as received.
    #[serde(default)]
    pub confidences: IndexMap<PolicyId, f64>,
}

impl BundlingAdvice {
    /// Advice with no content; equivalent to running without a service.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// True when the advice carries nothing actionable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.confidences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_advice_is_detectable() {
        assert!(BundlingAdvice::none().is_empty());
        let advice = BundlingAdvice {
            groups: vec![AdvisoryGroup::new(vec!["a".into()], "merge")],
            confidences: IndexMap::new(),
        };
        assert!(!advice.is_empty());
    }
}
