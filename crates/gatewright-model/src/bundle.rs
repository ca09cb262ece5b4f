//! Consolidation bundles: several source policies collapsing into one
//! target construct.
//!
//! Bundles are immutable once created. Membership is fixed at planning time;
//! later stages only read it, and the override path re-validates against it.

use crate::error::ModelError;
use crate::policy::PolicyId;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Unique identifier for a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(pub Ulid);

impl BundleId {
    /// Generate a new unique bundle id.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BundleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A group of policies that migrate together into one target construct.
///
/// Fields are private so a constructed bundle cannot lose members or have
/// them reordered; the planner is the only producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    id: BundleId,
    member_policy_ids: Vec<PolicyId>,
    target_construct: String,
    rationale: String,
}

impl Bundle {
    /// Create a bundle from members already sorted by execution order.
    ///
    /// # Errors
    /// Returns [`ModelError::EmptyBundle`] when `members` is empty.
    pub fn new(
        members: Vec<PolicyId>,
        target_construct: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Result<Self, ModelError> {
        if members.is_empty() {
            return Err(ModelError::EmptyBundle);
        }
        Ok(Self {
            id: BundleId::new(),
            member_policy_ids: members,
            target_construct: target_construct.into(),
            rationale: rationale.into(),
        })
    }

    /// The bundle's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> BundleId {
        self.id
    }

    /// Member ids in execution order.
    #[inline]
    #[must_use]
    pub fn member_policy_ids(&self) -> &[PolicyId] {
        &self.member_policy_ids
    }

    /// The single construct the members collapse into.
    #[inline]
    #[must_use]
    pub fn target_construct(&self) -> &str {
        &self.target_construct
    }

    /// Why the planner merged these members.
    #[inline]
    #[must_use]
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Number of member policies.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.member_policy_ids.len()
    }

    /// True when the bundle has no members. Never true for a constructed
    /// bundle; present for the usual len/is_empty pairing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.member_policy_ids.is_empty()
    }

    /// True when `id` is a member.
    #[must_use]
    pub fn contains(&self, id: &PolicyId) -> bool {
        self.member_policy_ids.iter().any(|m| m == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bundle_is_rejected() {
        let err = Bundle::new(Vec::new(), "rate-limiting", "nothing").unwrap_err();
        assert_eq!(err, ModelError::EmptyBundle);
    }

    #[test]
    fn membership_is_queryable() {
        let b = Bundle::new(
            vec!["verify".into(), "quota".into()],
            "rate-limiting",
            "auth + quota collapse",
        )
        .unwrap();
        assert_eq!(b.len(), 2);
        assert!(b.contains(&"quota".into()));
        assert!(!b.contains(&"cors".into()));
    }

    #[test]
    fn bundle_ids_are_distinct() {
        let a = Bundle::new(vec!["x".into()], "c", "r").unwrap();
        let b = Bundle::new(vec!["x".into()], "c", "r").unwrap();
        assert_ne!(a.id(), b.id());
    }
}
