//! Canonical domain types shared by every stage of a migration run.
//!
//! The model is deliberately inert: plain data with validating constructors,
//! no I/O and no policy. Pipeline stages communicate by value using these
//! types, which keeps each stage independently testable.
//!
//! # Layout
//! - [`policy`] — source-side descriptors: policy ids, types, phases, flows
//! - [`advisory`] — untrusted grouping and confidence proposals
//! - [`proxy`] — the normalized proxy input (upstream, routes, flows)
//! - [`bundle`] — consolidation groups emitted by the bundling planner
//! - [`disposition`] — the per-policy migration verdict
//! - [`coverage`] — the aggregated coverage report (pure function of
//!   dispositions)
//! - [`steps`] — manual-remediation steps and their ordering

pub mod advisory;
pub mod bundle;
pub mod coverage;
pub mod disposition;
pub mod error;
pub mod policy;
pub mod proxy;
pub mod steps;

pub use advisory::{AdvisoryGroup, BundlingAdvice};
pub use bundle::{Bundle, BundleId};
pub use coverage::CoverageReport;
pub use disposition::{Confidence, Disposition, DispositionKind};
pub use error::ModelError;
pub use policy::{ExecutionPhase, PolicyDescriptor, PolicyFlow, PolicyId, PolicyType, RawConfig};
pub use proxy::{ProxyModel, RouteSpec, UpstreamService};
pub use steps::{sort_steps, ManualStep, StepCategory, StepPriority};
