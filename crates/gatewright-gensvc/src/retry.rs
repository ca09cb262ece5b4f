//! Bounded retries with exponential backoff and jitter.
//!
//! Retry only what might succeed next time. The budget is small and the
//! delays are capped; a run waiting on a dead service should fail over to
//! its degraded path in seconds, not minutes.

use crate::service::GenError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Backoff envelope for generation-service calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay_ms: u64,
    /// Ceiling on any single delay.
    pub max_delay_ms: u64,
    /// Growth factor between attempts.
    pub multiplier: f64,
    /// Uniform random extra delay added to each backoff.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// One attempt, no waiting; for tests and interactive runs.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 1.0,
            jitter_ms: 0,
        }
    }

    /// Backoff before attempt `next_attempt` (2-based: the wait after the
    /// first failure precedes attempt 2).
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_before(&self, next_attempt: u32) -> Duration {
        let exponent = next_attempt.saturating_sub(2);
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(exponent as i32);
        let capped = base.min(self.max_delay_ms as f64).max(0.0) as u64;
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.jitter_ms)
        };
        Duration::from_millis(capped.saturating_add(jitter))
    }
}

/// Per-call limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Budget for one attempt, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Drive an operation through the retry policy.
///
/// Each attempt runs under the per-call timeout. Retryable failures burn
/// an attempt and wait out the backoff; non-retryable failures return
/// immediately. An exhausted budget becomes [`GenError::Unavailable`]
/// carrying the last failure.
///
/// # Errors
/// The first non-retryable error, or [`GenError::Unavailable`] after the
/// final attempt fails.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    options: &CallOptions,
    operation: &str,
    mut attempt_fn: F,
) -> Result<T, GenError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenError>>,
{
    let mut last_error: Option<GenError> = None;
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        let outcome = tokio::time::timeout(
            Duration::from_millis(options.timeout_ms),
            attempt_fn(),
        )
        .await;

        match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) if error.is_retryable() => {
                debug!(operation, attempt, %error, "retryable failure");
                last_error = Some(error);
            }
            Ok(Err(error)) => return Err(error),
            Err(_elapsed) => {
                debug!(operation, attempt, timeout_ms = options.timeout_ms, "attempt timed out");
                last_error = Some(GenError::Timeout {
                    timeout_ms: options.timeout_ms,
                });
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.delay_before(attempt + 1)).await;
        }
    }

    Err(GenError::Unavailable {
        attempts,
        message: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt was made".into()),
    })
}
