//! Policy consolidation: merging adjacent source policies into shared
//! target constructs.
//!
//! Bundling is the one stage where the migration gets *smaller* than the
//! source, so it is held to hard rules rather than heuristics:
//!
//! - every member must be bundle-eligible under the mapping table,
//! - members share one execution phase,
//! - no member may depend on an outside policy executing inside the
//!   bundle's span,
//! - member constructs must be identical or declared compatible.
//!
//! The greedy planner applies those rules deterministically. Advisory
//! proposals from the generation service pass through the same rules and
//! are adopted only when they do not lose consolidation ground.

pub mod planner;
pub mod rules;

pub use planner::{BundlePlan, BundlePlanner};
pub use rules::{PolicyIndex, RuleSet, RuleViolation};
