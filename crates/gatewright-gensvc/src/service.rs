//! The service trait and its errors.

use crate::artifact::PluginArtifact;
use crate::protocol::{AdvisoryRequest, PluginRequest, ReportRequest};
use async_trait::async_trait;
use gatewright_model::BundlingAdvice;
use thiserror::Error;

/// Errors crossing the generation-service boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenError {
    /// The transport layer failed before a response arrived.
    #[error("transport failure: {message}")]
    Transport {
        /// Underlying error text.
        message: String,
    },

    /// The call exceeded its per-call timeout.
    #[error("call timed out after {timeout_ms} ms")]
    Timeout {
        /// The budget that was exceeded.
        timeout_ms: u64,
    },

    /// The service answered with a non-success HTTP status.
    #[error("service answered with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The service answered, but the payload did not parse or made no sense.
    #[error("malformed response: {reason}")]
    MalformedResponse {
        /// What was wrong with the payload.
        reason: String,
    },

    /// The retry budget is exhausted; the stage should degrade.
    #[error("service unavailable after {attempts} attempt(s): {message}")]
    Unavailable {
        /// Attempts made before giving up.
        attempts: u32,
        /// The last underlying failure.
        message: String,
    },
}

impl GenError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Validation-style failures are never retried: a malformed payload
    /// will be malformed again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Status { status } => *status >= 500 || *status == 429,
            Self::MalformedResponse { .. } | Self::Unavailable { .. } => false,
        }
    }
}

/// The three operations the engine may ask of a generation service.
///
/// Implementations must be safe to call concurrently; the engine shares
/// one instance across runs behind an `Arc`.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Propose consolidation groups and confidence overrides.
    async fn advise_bundling(&self, request: AdvisoryRequest) -> Result<BundlingAdvice, GenError>;

    /// Produce custom plugin code for one policy.
    async fn synthesize_plugin(&self, request: PluginRequest) -> Result<PluginArtifact, GenError>;

    /// Draft the human-readable migration narrative.
    async fn draft_report(&self, request: ReportRequest) -> Result<String, GenError>;
}

/// A service that is never available.
///
/// The default wiring for air-gapped runs: every stage takes its degraded
/// path and the run still completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGenerationService;

#[async_trait]
impl GenerationService for NullGenerationService {
    async fn advise_bundling(&self, _request: AdvisoryRequest) -> Result<BundlingAdvice, GenError> {
        Err(Self::unavailable())
    }

    async fn synthesize_plugin(
        &self,
        _request: PluginRequest,
    ) -> Result<PluginArtifact, GenError> {
        Err(Self::unavailable())
    }

    async fn draft_report(&self, _request: ReportRequest) -> Result<String, GenError> {
        Err(Self::unavailable())
    }
}

impl NullGenerationService {
    fn unavailable() -> GenError {
        GenError::Unavailable {
            attempts: 0,
            message: "no generation service configured".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_split() {
        assert!(GenError::Transport { message: "reset".into() }.is_retryable());
        assert!(GenError::Timeout { timeout_ms: 100 }.is_retryable());
        assert!(GenError::Status { status: 503 }.is_retryable());
        assert!(GenError::Status { status: 429 }.is_retryable());
        assert!(!GenError::Status { status: 400 }.is_retryable());
        assert!(!GenError::MalformedResponse { reason: "bad json".into() }.is_retryable());
    }

    #[tokio::test]
    async fn null_service_is_always_unavailable() {
        let svc = NullGenerationService;
        let err = svc
            .advise_bundling(AdvisoryRequest {
                proxy_name: "orders".into(),
                policies: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Unavailable { attempts: 0, .. }));
    }
}
