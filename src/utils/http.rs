//! Request-context extraction shared by the token controllers.
//!
//! Handlers need the caller's host, scheme, method, path, authorization
//! header, and cookies to mint capability URLs and to bind refresh
//! credentials to cookies. [`RequestContext`] gathers all of that once.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
};
use anyhow::anyhow;

use crate::utils::errors::AppError;

/// Accepted authorization schemes, tried in order.
pub const AUTH_PREFIXES: [&str; 3] = ["Bearer", "jwt", "Token"];

/// Continuity header echoed on login and forced to "true" on refresh.
pub const REFRESH_HEADER: &str = "x-auth-refresh";

/// Pulls the bare token out of an authorization header value.
///
/// A single-word value is taken as the token itself. A two-word value must
/// lead with one of [`AUTH_PREFIXES`]. Anything longer is rejected.
pub fn extract_token(header_value: &str) -> Option<&str> {
    let parts: Vec<&str> = header_value.split_whitespace().collect();
    match parts.as_slice() {
        [token] => Some(token),
        [prefix, token] if AUTH_PREFIXES.iter().any(|p| p.eq_ignore_ascii_case(prefix)) => {
            Some(token)
        }
        _ => None,
    }
}

/// Splits a `Cookie` header value into name/value pairs.
pub fn cookie_pairs(cookie_header: &str) -> impl Iterator<Item = (&str, &str)> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
}

/// Looks up a cookie by exact name in a `Cookie` header value.
pub fn extract_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_pairs(cookie_header).find_map(|(k, v)| (k == name).then_some(v))
}

/// The parts of an incoming request the token services care about.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub host: String,
    pub ssl: bool,
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub cookie: Option<String>,
    /// Value of the `x-auth-refresh` header, echoed back on login.
    pub refresh_marker: Option<String>,
}

impl RequestContext {
    /// Scheme and host, e.g. `https://auth.example.com`.
    pub fn origin(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}", scheme, self.host)
    }

    /// Full URL of this request.
    pub fn url(&self) -> String {
        format!("{}{}", self.origin(), self.path)
    }

    /// Bare credential from the authorization header, if one parses.
    pub fn token(&self) -> Option<&str> {
        self.authorization.as_deref().and_then(extract_token)
    }

    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookie.as_deref().and_then(|c| extract_cookie(c, name))
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_str = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let host = header_str("host")
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .ok_or_else(|| {
                AppError::new(StatusCode::BAD_REQUEST, anyhow!("missing host header"))
            })?;

        let ssl = header_str("x-forwarded-proto")
            .map(|p| p.eq_ignore_ascii_case("https"))
            .unwrap_or(false);

        Ok(Self {
            host,
            ssl,
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            authorization: parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            cookie: header_str("cookie"),
            refresh_marker: header_str(REFRESH_HEADER),
        })
    }
}
