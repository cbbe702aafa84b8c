//! Bearer token authentication stage.
//!
//! Tokens are JWTs signed with a shared secret. Only the HMAC family is
//! accepted so a token cannot pick a weaker or asymmetric algorithm and have
//! the secret treated as a public key. An `exp` claim, when present, must lie
//! strictly in the future.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header::AUTHORIZATION, HeaderMap};
use futures_util::future::BoxFuture;
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::observability::metrics;
use crate::transport::{OutboundRequest, Transport, TransportResult};

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Reasons a bearer token is rejected. All of them fail the request the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed token")]
    Malformed,

    #[error("unexpected signing method: {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("invalid token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,
}

impl AuthError {
    fn label(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing",
            AuthError::Malformed => "malformed",
            AuthError::UnsupportedAlgorithm(_) => "algorithm",
            AuthError::BadSignature => "signature",
            AuthError::Expired => "expired",
        }
    }
}

/// Verifies HMAC-signed bearer tokens against a fixed secret.
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator").finish_non_exhaustive()
    }
}

impl TokenValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        // Expiry is optional and checked by hand so that it is strict.
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Validate a raw token (without the `Bearer ` prefix).
    pub fn validate(&self, token: &str) -> Result<(), AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let header = decode_header(token).map_err(|_| AuthError::Malformed)?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let data = decode::<serde_json::Value>(token, &self.key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::BadSignature,
                ErrorKind::InvalidAlgorithm => AuthError::UnsupportedAlgorithm(header.alg),
                _ => AuthError::Malformed,
            },
        )?;

        // Non-numeric `exp` values are ignored rather than rejected.
        if let Some(exp) = data.claims.get("exp").and_then(serde_json::Value::as_f64) {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64();
            if exp <= now {
                return Err(AuthError::Expired);
            }
        }

        Ok(())
    }

    /// Extract and validate the token carried in an `Authorization` header.
    pub fn validate_headers(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.validate(token)
    }
}

/// The token from `Authorization`, with an optional `Bearer` scheme removed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    if value.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

/// Pipeline stage that rejects requests without a valid bearer token.
pub struct AuthStage<T> {
    next: T,
    validator: Arc<TokenValidator>,
}

impl<T> AuthStage<T> {
    pub fn new(next: T, validator: Arc<TokenValidator>) -> Self {
        Self { next, validator }
    }
}

impl<T: Transport> Transport for AuthStage<T> {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResult> {
        Box::pin(async move {
            if let Err(err) = self.validator.validate_headers(&request.headers) {
                tracing::warn!(uri = %request.uri, reason = %err, "Rejected bearer token");
                metrics::record_auth_rejected(err.label());
                return Err(err.into());
            }
            self.next.execute(request).await
        })
    }
}
