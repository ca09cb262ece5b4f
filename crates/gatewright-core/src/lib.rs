//! The migration engine: orchestration over the analysis and synthesis
//! crates.
//!
//! One [`MigrationEngine`] serves many concurrent runs; the only shared
//! state is the immutable mapping table behind an `Arc`. A run's entire
//! state lives in the call frame of [`MigrationEngine::migrate`], so runs
//! never observe each other.
//!
//! # Layout
//! - [`engine`] — the pipeline and the run/package types
//! - [`normalize`] — structural validation of the proxy input
//! - [`classify`] — per-policy dispositions from table and bundle plan
//! - [`overrides`] — post-run manual reclassification
//! - [`config`] — tuning knobs with TOML loading
//! - [`cancel`] — cooperative cancellation
//! - [`error`] — the run-level error model

pub mod cancel;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod overrides;

pub use cancel::CancelSignal;
pub use classify::{classify_proxy, Classification};
pub use config::{ConfigError, EngineConfig};
pub use engine::{MigrationEngine, MigrationPackage, MigrationRun, RunId};
pub use error::MigrationError;
pub use normalize::validate_proxy;
pub use overrides::OverrideRequest;
