//! Retry stage.
//!
//! # Responsibilities
//! - Re-issue an attempt after a transport failure or a 5xx response
//! - Stop at the attempt bound and hand back whatever the last attempt produced
//! - Abandon the wait between attempts as soon as the request context ends
//!
//! # Design Decisions
//! - 4xx responses are final on the first attempt
//! - Cancellation and malformed requests are never retried
//! - Non-idempotent methods are retried unless `idempotent_only` is set

use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::transport::{OutboundRequest, Transport, TransportResult};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first, at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub delay: Duration,
    /// When set, the delay doubles per attempt (with jitter) up to this cap.
    pub max_delay: Option<Duration>,
    /// Only retry idempotent methods.
    pub idempotent_only: bool,
}

impl RetryPolicy {
    /// A fixed-delay policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            max_delay: None,
            idempotent_only: false,
        }
    }

    /// Delay to wait after `attempt` attempts have been made.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.max_delay {
            Some(max) if max > self.delay => calculate_backoff(attempt, self.delay, max),
            _ => self.delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let mut policy = Self::new(config.max_attempts, Duration::from_millis(config.delay_ms));
        policy.max_delay = (config.max_delay_ms > config.delay_ms)
            .then(|| Duration::from_millis(config.max_delay_ms));
        policy.idempotent_only = config.idempotent_only;
        policy
    }
}

/// Pipeline stage re-issuing failed attempts against the next stage.
pub struct RetryStage<T> {
    next: T,
    policy: RetryPolicy,
}

impl<T> RetryStage<T> {
    pub fn new(next: T, policy: RetryPolicy) -> Self {
        Self { next, policy }
    }
}

impl<T: Transport> Transport for RetryStage<T> {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResult> {
        Box::pin(async move {
            let max_attempts = if self.policy.idempotent_only && !request.method.is_idempotent() {
                1
            } else {
                self.policy.max_attempts.max(1)
            };

            let mut attempt = 1;
            loop {
                let result = self.next.execute(request.clone()).await;

                if attempt >= max_attempts {
                    return result;
                }

                let should_retry = match &result {
                    Ok(response) => response.status().is_server_error(),
                    Err(err) => err.is_retryable(),
                };
                if !should_retry {
                    return result;
                }

                match &result {
                    Ok(response) => {
                        tracing::info!(
                            uri = %request.uri,
                            attempt,
                            status = %response.status(),
                            "Retrying after server error"
                        );
                    }
                    Err(err) => {
                        tracing::info!(
                            uri = %request.uri,
                            attempt,
                            error = %err,
                            "Retrying after transport error"
                        );
                    }
                }
                // Release the failed response (and its connection) before waiting.
                drop(result);

                let delay = self.policy.delay_after(attempt);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    reason = request.context.done() => return Err(reason.into()),
                }

                metrics::record_retry();
                attempt += 1;
            }
        })
    }
}
