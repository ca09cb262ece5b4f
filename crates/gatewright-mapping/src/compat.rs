//! Construct compatibility: which distinct target constructs may share a
//! bundle.

use serde::{Deserialize, Serialize};

/// A declared unordered pair of bundle-compatible constructs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatPair {
    /// One construct name.
    pub a: String,
    /// The other construct name.
    pub b: String,
}

/// The compatibility relation over target construct names.
///
/// Identical constructs are always compatible; distinct constructs only
/// when a pair was declared. The relation is symmetric and deliberately
/// not transitive: each allowance is explicit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructCompat {
    pairs: Vec<CompatPair>,
}

impl ConstructCompat {
    /// An empty relation: only identical constructs are compatible.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a compatible pair, in either order.
    pub fn declare(&mut self, a: impl Into<String>, b: impl Into<String>) {
        let (a, b) = (a.into(), b.into());
        if !self.allows(&a, &b) {
            self.pairs.push(CompatPair { a, b });
        }
    }

    /// True when `a` and `b` may collapse into the same bundle.
    #[must_use]
    pub fn allows(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        self.pairs
            .iter()
            .any(|p| (p.a == a && p.b == b) || (p.a == b && p.b == a))
    }

    /// Declared pairs, in declaration order.
    #[must_use]
    pub fn pairs(&self) -> &[CompatPair] {
        &self.pairs
    }
}
