//! Federated credential verification.
//!
//! Google login hands us an id token minted by Google; we confirm it with
//! Google's `tokeninfo` endpoint rather than carrying their signing keys.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::utils::errors::AppError;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Error)]
pub enum FederatedError {
    #[error("federated login is not configured")]
    NotConfigured,

    #[error("identity provider rejected the credential")]
    Rejected,

    #[error("credential was issued for a different client")]
    AudienceMismatch,

    #[error("credential was issued for a different email")]
    EmailMismatch,

    #[error("identity provider unreachable: {0}")]
    Transport(String),
}

impl From<FederatedError> for AppError {
    fn from(err: FederatedError) -> Self {
        match err {
            FederatedError::Transport(_) => AppError::dependency(err),
            _ => AppError::unauthorized(err),
        }
    }
}

#[async_trait]
pub trait FederatedVerifier: Send + Sync {
    /// Verifies a provider credential for `email` and returns the
    /// provider's stable subject id.
    async fn verify(&self, email: &str, credential: &str) -> Result<String, FederatedError>;
}

pub struct GoogleVerifier {
    http: reqwest::Client,
    client_id: Option<String>,
}

impl GoogleVerifier {
    pub fn new(http: reqwest::Client, client_id: Option<String>) -> Self {
        Self { http, client_id }
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    email: String,
    sub: String,
}

#[async_trait]
impl FederatedVerifier for GoogleVerifier {
    #[instrument(skip(self, credential))]
    async fn verify(&self, email: &str, credential: &str) -> Result<String, FederatedError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or(FederatedError::NotConfigured)?;

        let response = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|e| FederatedError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FederatedError::Rejected);
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| FederatedError::Transport(e.to_string()))?;

        if info.aud != client_id {
            return Err(FederatedError::AudienceMismatch);
        }
        if !info.email.eq_ignore_ascii_case(email) {
            return Err(FederatedError::EmailMismatch);
        }

        Ok(info.sub)
    }
}
