use chrono::{DateTime, Utc};
use data_encoding::BASE64URL_NOPAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::modules::keys::model::GeneratedKeys;
use crate::storage::{Row, RowStore, StoreError, create_row, get_row};
use crate::utils::errors::AppError;
use crate::utils::http::RequestContext;

use super::model::{AccessClaims, RefreshDetail, TokenPayload};

/// Access tokens live one hour.
pub const TOKEN_TTL_SECS: i64 = 3600;

/// Cookie name prefix; the login row's sort key follows it.
pub const REFRESH_COOKIE_PREFIX: &str = "__Secure-ag_rt_";

/// Sort-key prefix of refresh session rows.
pub const REFRESH_SK_PREFIX: &str = "jwt_refresh_";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("token signing failed")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AppError::bad_request(err),
            _ => AppError::internal(err),
        }
    }
}

/// Refresh failures. Everything the caller could have caused collapses to a
/// 403 so probes learn nothing about which check failed.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("missing refresh credential")]
    MissingCredential,

    #[error("malformed token")]
    Malformed,

    #[error("unknown refresh session")]
    NotFound,

    #[error("refresh token mismatch")]
    Mismatch,

    #[error("refresh session expired")]
    Expired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RefreshError> for AppError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Store(e) => AppError::internal(e),
            _ => AppError::forbidden(err),
        }
    }
}

/// Stable subject id for an account: `urn:auth:<domain>:<id>`.
pub fn generate_audience(domain: &str, id: &str) -> String {
    format!("urn:auth:{domain}:{id}")
}

/// Decodes a token's claims without checking the signature. Only for
/// routing decisions; trust comes from verification.
pub fn decode_claims_unverified<T: DeserializeOwned>(token: &str) -> Result<T, TokenError> {
    let mut parts = token.split('.');
    let (Some(_), Some(claims), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let bytes = BASE64URL_NOPAD
        .decode(claims.as_bytes())
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

/// The capability URLs a token carries, derived from the request that
/// minted it.
#[derive(Debug, Clone)]
pub struct CapabilityUrls {
    pub refresh_url: String,
    pub authorize_url: String,
    pub certs_url: String,
}

pub struct TokenService;

impl TokenService {
    /// Derives capability URLs from the request URL. A trailing `/refresh`
    /// segment is stripped first so refreshed tokens carry the same URLs as
    /// freshly minted ones.
    pub fn capability_urls(ctx: &RequestContext) -> CapabilityUrls {
        let url = ctx.url();
        let base = url.strip_suffix("/refresh").unwrap_or(&url);

        CapabilityUrls {
            refresh_url: format!("{base}/refresh"),
            authorize_url: format!("{base}/authorize"),
            certs_url: format!("{base}/certs"),
        }
    }

    /// Signs an access token over `payload` with the service key pair. The
    /// issuer is the payload's own certs URL, so verifiers are pointed at
    /// the key set of whichever host minted the token.
    #[instrument(skip(keys, payload))]
    pub fn issue_token(
        keys: &GeneratedKeys,
        domain: &str,
        payload: TokenPayload,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = AccessClaims {
            sub: payload.id.clone(),
            aud: generate_audience(domain, &payload.id),
            iss: payload.certs_url.clone(),
            iat,
            exp: iat + TOKEN_TTL_SECS,
            payload,
        };

        let mut header = Header::new(Algorithm::ES256);
        header.kid = keys.private_key.jwk.key_id.clone();

        let key = EncodingKey::from_ec_pem(keys.private_key.pem.as_bytes())?;
        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }

    /// Creates or rotates the refresh session for one login and renders its
    /// cookie.
    ///
    /// The cookie name and the row are both keyed by the login row's sort
    /// key, and the row is written with overwrite. One session per login:
    /// every issuance replaces the previous record, so a superseded opaque
    /// token stops validating. `reuse_token` carries the previous session's
    /// credential on rotation; login passes `None` and gets a fresh one.
    #[instrument(skip(store, reuse_token))]
    pub async fn issue_refresh_token(
        store: &dyn RowStore,
        id: &str,
        login_sk: &str,
        host: &str,
        reuse_token: Option<String>,
        max_age_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<Row<RefreshDetail>, TokenError> {
        let token = reuse_token.unwrap_or_else(|| Uuid::new_v4().to_string());

        let cookie_name = format!("{REFRESH_COOKIE_PREFIX}{login_sk}");
        // Cookie domains never carry a port.
        let domain = host.split(':').next().unwrap_or(host);
        let header = format!(
            "{cookie_name}={token}; Domain={domain}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=None; Secure"
        );

        let sk = format!("{REFRESH_SK_PREFIX}{login_sk}");
        let detail = RefreshDetail {
            sk: login_sk.to_string(),
            token,
            expires: now.timestamp() + max_age_secs,
            header,
        };

        Ok(create_row(store, id, &sk, &detail, true).await?)
    }

    /// Locates and checks the refresh session named by the request's token
    /// and cookie. The login sort key recovered from the decoded token
    /// names both the row and the cookie to compare against. Every check
    /// must pass; any miss is a [`RefreshError`].
    #[instrument(skip(store, ctx))]
    pub async fn fetch_refresh_row(
        store: &dyn RowStore,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<(AccessClaims, Row<RefreshDetail>), RefreshError> {
        let token = ctx.token().ok_or(RefreshError::MissingCredential)?;
        let claims: AccessClaims =
            decode_claims_unverified(token).map_err(|_| RefreshError::Malformed)?;

        let cookie_name = format!("{REFRESH_COOKIE_PREFIX}{}", claims.payload.sk);
        let cookie_token = ctx
            .cookie_value(&cookie_name)
            .ok_or(RefreshError::MissingCredential)?;

        let sk = format!("{REFRESH_SK_PREFIX}{}", claims.payload.sk);
        let row = get_row::<RefreshDetail>(store, &claims.payload.id, &sk)
            .await?
            .ok_or(RefreshError::NotFound)?;

        if row.detail.token != cookie_token {
            return Err(RefreshError::Mismatch);
        }
        if row.detail.expires <= now.timestamp() {
            return Err(RefreshError::Expired);
        }

        Ok((claims, row))
    }
}
