//! Coverage aggregation.
//!
//! [`CoverageReport`] is a pure function of the disposition set: same
//! dispositions in, identical report out, no hidden state. The four kind
//! counts are disjoint and always sum to the total.

use crate::disposition::{Disposition, DispositionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Aggregated migration metrics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Total policies examined.
    pub total_policies: usize,
    /// Policies with a direct one-to-one migration.
    pub auto_migrated: usize,
    /// Policies living inside consolidation bundles, one count per policy.
    pub bundled_count: usize,
    /// Policies requiring custom extension code.
    pub custom_required: usize,
    /// Policies the target gateway makes redundant.
    pub not_required: usize,
    /// `auto_migrated / total_policies * 100`; `0.0` when the run had no
    /// policies (see [`Self::no_policies`]).
    pub coverage_percentage: f64,
    /// Construct reduction won by bundling, over the bundle-affected
    /// policies only: `(bundled_count - bundles) / bundled_count * 100`.
    pub bundling_efficiency_percentage: f64,
    /// True when the run contained zero policies, distinguishing an empty
    /// input from genuinely zero coverage.
    pub no_policies: bool,
    /// True when no bundles were formed, distinguishing "nothing to
    /// consolidate" from zero-efficiency bundling.
    pub no_bundles: bool,
}

impl CoverageReport {
    /// Compute the report from a run's dispositions.
    #[must_use]
    pub fn from_dispositions(dispositions: &[Disposition]) -> Self {
        let total = dispositions.len();
        let mut auto_migrated = 0usize;
        let mut bundled_count = 0usize;
        let mut custom_required = 0usize;
        let mut not_required = 0usize;
        let mut bundles = BTreeSet::new();

        for d in dispositions {
            match d.kind {
                DispositionKind::Direct => auto_migrated += 1,
                DispositionKind::Bundled => {
                    bundled_count += 1;
                    if let Some(id) = d.bundle_id {
                        bundles.insert(id);
                    }
                }
                DispositionKind::Custom => custom_required += 1,
                DispositionKind::NotRequired => not_required += 1,
            }
        }

        let no_policies = total == 0;
        #[allow(clippy::cast_precision_loss)]
        let coverage_percentage = if no_policies {
            0.0
        } else {
            auto_migrated as f64 / total as f64 * 100.0
        };

        let no_bundles = bundled_count == 0;
        #[allow(clippy::cast_precision_loss)]
        let bundling_efficiency_percentage = if no_bundles {
            0.0
        } else {
            let saved = bundled_count - bundles.len();
            saved as f64 / bundled_count as f64 * 100.0
        };

        Self {
            total_policies: total,
            auto_migrated,
            bundled_count,
            custom_required,
            not_required,
            coverage_percentage,
            bundling_efficiency_percentage,
            no_policies,
            no_bundles,
        }
    }

    /// The conservation identity the four buckets must satisfy.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.auto_migrated + self.bundled_count + self.custom_required + self.not_required
            == self.total_policies
    }
}
