//! The generation-service boundary.
//!
//! Three request kinds cross it: bundling advisory, custom plugin
//! synthesis, and report prose. The engine never blocks on this service
//! being up; every caller has a degraded path. Calls are bounded by a
//! per-call timeout and a bounded retry budget with backoff, and anything
//! the service returns is validated before use.

pub mod artifact;
pub mod http;
pub mod protocol;
pub mod retry;
pub mod service;

pub use artifact::{derive_plugin_name, ArtifactViolation, PluginArtifact};
pub use http::HttpGenerationService;
pub use protocol::{
    AdvisoryRequest, PluginContract, PluginRequest, PolicySummary, ReportReply, ReportRequest,
};
pub use retry::{CallOptions, RetryPolicy};
pub use service::{GenError, GenerationService, NullGenerationService};
