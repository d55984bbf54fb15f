//! Token-based request authorization.
//!
//! [`AuthUser`] is the extractor for routes that need a fully verified
//! access token; this service's own routes use it. [`authorize`] and
//! [`AuthzCache`] are the consumer-facing surface: a downstream service
//! guarding its routes with tokens minted here calls [`authorize`] per
//! request, and the decision is made by the remote endpoint named inside
//! the token, with a process-local positive cache in front of it. Nothing
//! in this binary routes through the delegate; it exists for embedders.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use crate::modules::token::model::AccessClaims;
use crate::modules::token::service::decode_claims_unverified;
use crate::modules::verify::service::VerifyService;
use crate::state::AppState;
use crate::utils::clock::Clock;
use crate::utils::errors::AppError;
use crate::utils::http::{RequestContext, extract_token};

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("unsupported authorization scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing or malformed authorization header")]
    MalformedAuthorization,

    #[error("malformed token")]
    MalformedToken,

    #[error("authorization endpoint rejected the request: {0}")]
    Remote(String),

    #[error("not authorized")]
    Denied,

    #[error("authorization endpoint unreachable: {0}")]
    Transport(String),
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Denied => AppError::forbidden(err),
            AuthzError::Remote(_) | AuthzError::Transport(_) => AppError::dependency(err),
            _ => AppError::unauthorized(err),
        }
    }
}

/// A positive authorization decision, cached until the token itself
/// expires.
#[derive(Debug, Clone)]
pub struct AuthzDecision {
    pub id: String,
    pub payload: Value,
    /// Unix seconds; taken from the token's `exp` claim.
    pub expires: i64,
}

/// Process-local cache of positive authorization decisions, keyed by a
/// fingerprint of token, method, and path. Denials are never cached.
pub struct AuthzCache {
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, AuthzDecision>>,
}

impl AuthzCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<AuthzDecision> {
        let entries = self.entries.read().unwrap();
        let decision = entries.get(fingerprint)?;
        if decision.expires <= self.clock.now().timestamp() {
            return None;
        }
        Some(decision.clone())
    }

    pub fn insert(&self, fingerprint: String, decision: AuthzDecision) {
        self.entries.write().unwrap().insert(fingerprint, decision);
    }
}

/// Cache key: the token and the request it was used for.
pub fn fingerprint(token: &str, method: &str, path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(method.as_bytes());
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Serialize)]
struct DelegateRequest<'a> {
    token: &'a str,
    scopes: &'a [String],
    method: &'a str,
    host: &'a str,
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct DelegateResponse {
    #[serde(default)]
    authorized: bool,
    payload: Option<Value>,
    error: Option<String>,
}

/// Delegates an authorization decision to the endpoint named inside the
/// request's token.
///
/// The token is not verified locally; the remote endpoint owns the
/// decision. A cached positive decision short-circuits the call.
#[instrument(skip(http, cache, ctx))]
pub async fn authorize(
    http: &reqwest::Client,
    cache: &AuthzCache,
    ctx: &RequestContext,
    scheme: &str,
    scopes: &[String],
) -> Result<AuthzDecision, AuthzError> {
    if !scheme.eq_ignore_ascii_case("jwt") {
        return Err(AuthzError::UnsupportedScheme(scheme.to_string()));
    }

    let token = ctx.token().ok_or(AuthzError::MalformedAuthorization)?;
    let fp = fingerprint(token, &ctx.method, &ctx.path);
    if let Some(decision) = cache.get(&fp) {
        return Ok(decision);
    }

    let claims: Value =
        decode_claims_unverified(token).map_err(|_| AuthzError::MalformedToken)?;
    let authorize_url = claims["authorizeUrl"]
        .as_str()
        .ok_or(AuthzError::MalformedToken)?;
    let id = claims["sub"].as_str().unwrap_or_default().to_string();
    let expires = claims["exp"].as_i64().unwrap_or_default();

    let response = http
        .post(authorize_url)
        .json(&DelegateRequest {
            token,
            scopes,
            method: &ctx.method,
            host: &ctx.host,
            path: &ctx.path,
        })
        .send()
        .await
        .map_err(|e| AuthzError::Transport(e.to_string()))?
        .json::<DelegateResponse>()
        .await
        .map_err(|e| AuthzError::Transport(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(AuthzError::Remote(error));
    }
    if !response.authorized {
        return Err(AuthzError::Denied);
    }

    let decision = AuthzDecision {
        id,
        payload: response.payload.unwrap_or(Value::Null),
        expires,
    };
    cache.insert(fp, decision.clone());

    Ok(decision)
}

/// Extractor for routes that require a locally verified access token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AccessClaims);

impl AuthUser {
    pub fn subject(&self) -> &str {
        &self.0.sub
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::unauthorized(AuthzError::MalformedAuthorization)
            })?;

        let token = extract_token(auth_header)
            .ok_or_else(|| AppError::unauthorized(AuthzError::MalformedAuthorization))?;

        let claims = VerifyService::verify(
            &state.http,
            &state.jwks_cache,
            state.secrets.as_ref(),
            &state.service_config.domain,
            token,
        )
        .await?;

        Ok(AuthUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_binds_token_method_and_path() {
        let base = fingerprint("tok", "GET", "/a");
        assert_ne!(base, fingerprint("tok2", "GET", "/a"));
        assert_ne!(base, fingerprint("tok", "POST", "/a"));
        assert_ne!(base, fingerprint("tok", "GET", "/b"));
        assert_eq!(base, fingerprint("tok", "GET", "/a"));
    }
}
