//! HTTP-backed generation service.
//!
//! Thin JSON-over-POST client: one endpoint per request kind, retries and
//! timeouts handled by [`crate::retry`]. The service's availability is
//! never assumed; callers treat [`GenError::Unavailable`] as an ordinary
//! outcome.

use crate::artifact::PluginArtifact;
use crate::protocol::{AdvisoryRequest, PluginRequest, ReportReply, ReportRequest};
use crate::retry::{with_retry, CallOptions, RetryPolicy};
use crate::service::{GenError, GenerationService};
use async_trait::async_trait;
use gatewright_model::BundlingAdvice;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// JSON client for a remote generation service.
#[derive(Debug, Clone)]
pub struct HttpGenerationService {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    options: CallOptions,
}

impl HttpGenerationService {
    /// Create a client for the given base URL.
    ///
    /// # Errors
    /// [`GenError::Transport`] when the underlying client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, GenError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| GenError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            retry: RetryPolicy::default(),
            options: CallOptions::default(),
        })
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the per-call options.
    #[must_use]
    pub fn with_call_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    async fn post_json<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, GenError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let payload = serde_json::to_value(request).map_err(|e| GenError::MalformedResponse {
            reason: format!("request serialization failed: {e}"),
        })?;
        debug!(%url, "generation service call");

        with_retry(&self.retry, &self.options, path, || {
            let client = self.client.clone();
            let url = url.clone();
            let payload = payload.clone();
            async move {
                let response = client
                    .post(&url)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| GenError::Transport {
                        message: e.to_string(),
                    })?;
                let status = response.status();
                if !status.is_success() {
                    return Err(GenError::Status {
                        status: status.as_u16(),
                    });
                }
                response
                    .json::<Resp>()
                    .await
                    .map_err(|e| GenError::MalformedResponse {
                        reason: e.to_string(),
                    })
            }
        })
        .await
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn advise_bundling(&self, request: AdvisoryRequest) -> Result<BundlingAdvice, GenError> {
        self.post_json("/v1/bundling-advice", &request).await
    }

    async fn synthesize_plugin(&self, request: PluginRequest) -> Result<PluginArtifact, GenError> {
        self.post_json("/v1/plugin-synthesis", &request).await
    }

    async fn draft_report(&self, request: ReportRequest) -> Result<String, GenError> {
        let reply: ReportReply = self.post_json("/v1/report-prose", &request).await?;
        if reply.narrative.trim().is_empty() {
            return Err(GenError::MalformedResponse {
                reason: "empty narrative".into(),
            });
        }
        Ok(reply.narrative)
    }
}
