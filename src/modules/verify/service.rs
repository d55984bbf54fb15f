use axum::http::StatusCode;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::modules::keys::service::KeyService;
use crate::modules::token::model::AccessClaims;
use crate::modules::token::service::decode_claims_unverified;
use crate::storage::SecretStore;
use crate::utils::errors::AppError;

use super::cache::JwksCache;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed token")]
    Malformed,

    #[error("token is missing the {0} claim")]
    MissingClaim(&'static str),

    #[error("token audience is not this service")]
    AudienceMismatch,

    #[error("token issuer is not this service")]
    IssuerMismatch,

    #[error("failed to fetch verification keys: {0}")]
    KeyFetch(String),

    #[error("signing keys unavailable: {0}")]
    KeyStore(String),

    #[error("no verification key matches the token")]
    UnknownKey,

    #[error("token signature is invalid")]
    Signature(#[source] jsonwebtoken::errors::Error),
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::KeyFetch(_) => AppError::dependency(err),
            VerifyError::KeyStore(_) => AppError::internal(err),
            _ => AppError::new(StatusCode::UNAUTHORIZED, err),
        }
    }
}

pub struct VerifyService;

impl VerifyService {
    /// Fully verifies an access token: claim shape, audience, issuer, and
    /// signature against the issuer's published key set.
    ///
    /// The claim checks run on unverified content first so an obviously
    /// foreign token is rejected without a network fetch. The issuer URL's
    /// hostname must carry the stored key pair's issuer domain. Trust still
    /// comes only from the final signature check.
    #[instrument(skip_all)]
    pub async fn verify(
        http: &reqwest::Client,
        cache: &JwksCache,
        secrets: &dyn SecretStore,
        domain: &str,
        token: &str,
    ) -> Result<AccessClaims, VerifyError> {
        let raw: Value = decode_claims_unverified(token).map_err(|_| VerifyError::Malformed)?;

        let aud = raw["aud"]
            .as_str()
            .ok_or(VerifyError::MissingClaim("aud"))?;
        let iss = raw["iss"]
            .as_str()
            .ok_or(VerifyError::MissingClaim("iss"))?;

        // aud is urn:auth:<domain>:<subject id>.
        let domain_segment = aud.split(':').nth(2).unwrap_or("");
        if domain_segment != domain {
            return Err(VerifyError::AudienceMismatch);
        }

        let keys = KeyService::get_or_create_keys(secrets, domain)
            .await
            .map_err(|e| VerifyError::KeyStore(e.to_string()))?;

        let iss_host = Url::parse(iss)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or(VerifyError::IssuerMismatch)?;
        if !iss_host.contains(&keys.issuer) {
            return Err(VerifyError::IssuerMismatch);
        }

        let jwks = match cache.get(iss) {
            Some(set) => set,
            None => {
                let set = Self::fetch_jwks(http, iss).await?;
                cache.insert(iss, set.clone());
                set
            }
        };

        let header = jsonwebtoken::decode_header(token).map_err(|_| VerifyError::Malformed)?;
        let jwk = match header.kid.as_deref().and_then(|kid| jwks.find(kid)) {
            Some(jwk) => jwk,
            None => jwks.keys.first().ok_or(VerifyError::UnknownKey)?,
        };

        let key = DecodingKey::from_jwk(jwk).map_err(|_| VerifyError::UnknownKey)?;
        let mut validation = Validation::new(Algorithm::ES256);
        // Audience was already checked against the urn scheme above.
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<AccessClaims>(token, &key, &validation)
            .map_err(VerifyError::Signature)?;

        Ok(data.claims)
    }

    async fn fetch_jwks(http: &reqwest::Client, url: &str) -> Result<JwkSet, VerifyError> {
        let response = http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))
    }
}
