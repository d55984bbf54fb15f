use jsonwebkey::JsonWebKey;
use serde::{Deserialize, Serialize};

/// One half of the signing key pair, in both serializations consumers need:
/// PEM for `jsonwebtoken` and JWK for the published key set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub pem: String,
    pub jwk: JsonWebKey,
}

/// The persisted signing key pair. Stored in the secret store under `jwks`
/// as base64 of this struct's JSON, so every process that reads it signs
/// with identical material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedKeys {
    /// Service domain this pair signs for. A token's `iss` URL must carry
    /// this value in its hostname to verify.
    pub issuer: String,
    pub public_key: KeyMaterial,
    pub private_key: KeyMaterial,
}
