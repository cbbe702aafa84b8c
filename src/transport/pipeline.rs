//! Pipeline composition.
//!
//! Stages are always stacked in the same order, outermost first:
//!
//! ```text
//! rate limit → auth → audit logging → retry → base transport
//! ```
//!
//! Admission happens before anything else so rejected or queued requests
//! cost nothing downstream. Auth runs before logging and retry so an invalid
//! token never produces upstream traffic and is never re-checked per attempt.
//! Logging sits outside retry, so one record describes the final outcome.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::audit::{AuditLogger, LoggingStage};
use crate::resilience::retries::{RetryPolicy, RetryStage};
use crate::security::auth::{AuthStage, TokenValidator};
use crate::security::rate_limit::{RateLimitStage, TokenBucket};
use crate::transport::{OutboundRequest, Transport, TransportResult};

/// Default number of body bytes kept in audit snapshots.
pub const DEFAULT_CAPTURE_LIMIT: usize = 64 * 1024;

/// A composed, shareable request-execution unit.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<dyn Transport>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub async fn execute(&self, request: OutboundRequest) -> TransportResult {
        self.inner.execute(request).await
    }
}

impl Transport for Pipeline {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResult> {
        self.inner.execute(request)
    }
}

/// Collects the shared pieces and stacks the stages around a base transport.
pub struct PipelineBuilder {
    limiter: Option<Arc<TokenBucket>>,
    validator: Option<Arc<TokenValidator>>,
    logger: Option<Arc<AuditLogger>>,
    capture_limit: usize,
    retry: Option<RetryPolicy>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            limiter: None,
            validator: None,
            logger: None,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
            retry: None,
        }
    }
}

impl PipelineBuilder {
    pub fn rate_limit(mut self, limiter: Arc<TokenBucket>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn auth(mut self, validator: Arc<TokenValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn audit(mut self, logger: Arc<AuditLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn capture_limit(mut self, bytes: usize) -> Self {
        self.capture_limit = bytes;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn build<T: Transport + 'static>(self, base: T) -> Pipeline {
        let mut next: Box<dyn Transport> = Box::new(base);

        if let Some(policy) = self.retry {
            next = Box::new(RetryStage::new(next, policy));
        }
        if let Some(logger) = self.logger {
            next = Box::new(LoggingStage::new(next, logger, self.capture_limit));
        }
        if let Some(validator) = self.validator {
            next = Box::new(AuthStage::new(next, validator));
        }
        if let Some(limiter) = self.limiter {
            next = Box::new(RateLimitStage::new(next, limiter));
        }

        Pipeline {
            inner: Arc::from(next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryStore;
    use crate::config::AuditConfig;
    use crate::transport::{RequestContext, TransportError};
    use axum::body::Body;
    use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Method, Response, StatusCode, Uri};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Counts calls; answers with a fixed status.
    struct Upstream {
        calls: Arc<AtomicU32>,
        status: StatusCode,
    }

    impl Transport for Upstream {
        fn execute(&self, _request: OutboundRequest) -> BoxFuture<'_, TransportResult> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(Response::builder().status(self.status).body(Body::empty()).unwrap())
            })
        }
    }

    fn request(auth: Option<&'static str>) -> OutboundRequest {
        let mut headers = HeaderMap::new();
        if let Some(value) = auth {
            headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        }
        OutboundRequest::new(Method::GET, Uri::from_static("http://up.example/a")).with_headers(headers)
    }

    #[tokio::test]
    async fn test_invalid_token_never_reaches_upstream_or_audit() {
        let calls = Arc::new(AtomicU32::new(0));
        let store = Arc::new(MemoryStore::new());
        let logger = AuditLogger::spawn(store.clone(), &AuditConfig::default());

        let pipeline = Pipeline::builder()
            .rate_limit(Arc::new(TokenBucket::new(100.0, 10)))
            .auth(Arc::new(TokenValidator::new(b"secret")))
            .audit(logger.clone())
            .retry(RetryPolicy::new(3, Duration::from_millis(1)))
            .build(Upstream { calls: calls.clone(), status: StatusCode::OK });

        let err = pipeline.execute(request(Some("Bearer garbage"))).await.unwrap_err();
        assert!(matches!(err, TransportError::Unauthorized(_)));
        assert!(!err.is_recorded());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        logger.close().await;
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_logged_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let store = Arc::new(MemoryStore::new());
        let logger = AuditLogger::spawn(store.clone(), &AuditConfig::default());

        let pipeline = Pipeline::builder()
            .audit(logger.clone())
            .retry(RetryPolicy::new(3, Duration::from_millis(5)))
            .build(Upstream { calls: calls.clone(), status: StatusCode::SERVICE_UNAVAILABLE });

        let response = pipeline.execute(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        drop(response);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        logger.close().await;
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, Some(503));
        assert!(!records[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_deadline_aborts_before_upstream() {
        let calls = Arc::new(AtomicU32::new(0));
        let limiter = Arc::new(TokenBucket::new(1.0, 1));
        assert!(limiter.try_acquire());

        let pipeline = Pipeline::builder()
            .rate_limit(limiter)
            .build(Upstream { calls: calls.clone(), status: StatusCode::OK });

        let req = request(None).with_context(RequestContext::with_timeout(Duration::from_millis(10)));
        let err = pipeline.execute(req).await.unwrap_err();
        assert!(matches!(err, TransportError::Aborted(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
