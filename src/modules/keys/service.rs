use data_encoding::BASE64;
use jsonwebkey::{JsonWebKey, Key, KeyUse};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::storage::{SecretStore, StoreError};
use crate::utils::errors::AppError;

use super::model::{GeneratedKeys, KeyMaterial};

/// Secret-store name the key pair lives under.
pub const KEYS_SECRET: &str = "jwks";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("signing keys unavailable")]
    Unavailable,

    #[error("stored key material is invalid")]
    Corrupt,

    #[error("key generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<KeyError> for AppError {
    fn from(err: KeyError) -> Self {
        AppError::internal(err)
    }
}

pub struct KeyService;

impl KeyService {
    /// Loads the signing key pair, generating and persisting one if none
    /// exists yet. `issuer` is the service domain the pair signs for; token
    /// issuer URLs must carry it in their hostname to verify.
    ///
    /// Bootstrap is create-if-absent: after writing, the secret is re-read
    /// so that when several processes race, every one of them ends up
    /// signing with the single pair that won the write.
    #[instrument(skip(secrets))]
    pub async fn get_or_create_keys(
        secrets: &dyn SecretStore,
        issuer: &str,
    ) -> Result<GeneratedKeys, KeyError> {
        if let Some(encoded) = secrets.get(KEYS_SECRET).await? {
            return Self::decode(&encoded);
        }

        let generated = Self::generate(issuer)?;
        let json = serde_json::to_vec(&generated).map_err(|_| KeyError::Corrupt)?;
        secrets
            .set(KEYS_SECRET, &BASE64.encode(&json), true)
            .await?;

        match secrets.get(KEYS_SECRET).await? {
            Some(encoded) => Self::decode(&encoded),
            None => Err(KeyError::Unavailable),
        }
    }

    fn generate(issuer: &str) -> Result<GeneratedKeys, KeyError> {
        let kid = Uuid::new_v4().to_string();

        let mut private = JsonWebKey::new(Key::generate_p256());
        private.key_id = Some(kid.clone());
        private.key_use = Some(KeyUse::Signing);
        private
            .set_algorithm(jsonwebkey::Algorithm::ES256)
            .map_err(|e| KeyError::Generation(e.to_string()))?;

        let public_half = private
            .key
            .to_public()
            .ok_or_else(|| KeyError::Generation("key has no public half".to_string()))?
            .into_owned();

        let mut public = JsonWebKey::new(public_half);
        public.key_id = Some(kid);
        public.key_use = Some(KeyUse::Signing);
        public
            .set_algorithm(jsonwebkey::Algorithm::ES256)
            .map_err(|e| KeyError::Generation(e.to_string()))?;

        let private_pem = private.key.to_pem();
        let public_pem = public.key.to_pem();

        Ok(GeneratedKeys {
            issuer: issuer.to_string(),
            public_key: KeyMaterial {
                pem: public_pem,
                jwk: public,
            },
            private_key: KeyMaterial {
                pem: private_pem,
                jwk: private,
            },
        })
    }

    fn decode(encoded: &str) -> Result<GeneratedKeys, KeyError> {
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|_| KeyError::Corrupt)?;
        serde_json::from_slice(&bytes).map_err(|_| KeyError::Corrupt)
    }

    /// The published key set: the public half only, never the private key.
    pub fn public_jwk_set(keys: &GeneratedKeys) -> serde_json::Value {
        serde_json::json!({ "keys": [keys.public_key.jwk] })
    }
}
