//! Global admission control with a token bucket.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::transport::{
    ContextError, OutboundRequest, RequestContext, Transport, TransportResult,
};

/// Mutable bucket state, only touched under the limiter's lock.
#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_update: Instant,
}

/// A token bucket refilling continuously at `rps` up to `burst`.
///
/// One instance is shared by every route of a gateway, so admission is
/// global rather than per route.
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    rps: f64,
    burst: f64,
}

impl TokenBucket {
    /// Create a full bucket. `rps` must be positive and `burst` at least one.
    pub fn new(rps: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: burst,
                last_update: Instant::now(),
            }),
            rps: rps.max(f64::MIN_POSITIVE),
            burst,
        }
    }

    pub fn rps(&self) -> f64 {
        self.rps
    }

    pub fn burst(&self) -> f64 {
        self.burst
    }

    /// Take one token if available, otherwise return how long until one is.
    fn reserve(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rps).min(self.burst);
        state.last_update = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let wait = (1.0 - state.tokens) / self.rps;
            Err(Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX))
        }
    }

    /// Take a token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.reserve().is_ok()
    }

    /// Currently available tokens (after refill).
    pub fn available(&self) -> f64 {
        let state = self.state.lock().expect("rate limiter mutex poisoned");
        let elapsed = Instant::now().duration_since(state.last_update).as_secs_f64();
        (state.tokens + elapsed * self.rps).min(self.burst)
    }

    /// Wait for a token, giving up when the context ends.
    ///
    /// Nothing is consumed on failure. If the context deadline falls before
    /// the earliest moment a token could exist, fails immediately.
    pub async fn acquire(&self, ctx: &RequestContext) -> Result<(), ContextError> {
        loop {
            if let Some(reason) = ctx.error() {
                return Err(reason);
            }

            let wait = match self.reserve() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            if let Some(deadline) = ctx.deadline() {
                match Instant::now().checked_add(wait) {
                    Some(ready_at) if ready_at <= deadline => {}
                    _ => return Err(ContextError::DeadlineExceeded),
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                reason = ctx.done() => return Err(reason),
            }
        }
    }
}

/// Pipeline stage gating requests on a shared [`TokenBucket`].
pub struct RateLimitStage<T> {
    next: T,
    limiter: Arc<TokenBucket>,
}

impl<T> RateLimitStage<T> {
    pub fn new(next: T, limiter: Arc<TokenBucket>) -> Self {
        Self { next, limiter }
    }
}

impl<T: Transport> Transport for RateLimitStage<T> {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResult> {
        Box::pin(async move {
            let started = Instant::now();
            if let Err(reason) = self.limiter.acquire(&request.context).await {
                tracing::warn!(
                    uri = %request.uri,
                    waited_ms = started.elapsed().as_millis() as u64,
                    reason = %reason,
                    "Admission aborted while waiting for rate limiter"
                );
                metrics::record_rate_limited(&reason.to_string());
                return Err(reason.into());
            }
            self.next.execute(request).await
        })
    }
}
