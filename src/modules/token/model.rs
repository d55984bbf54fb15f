use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::modules::login::model::ProviderClaims;

/// Service-specific claims carried inside every access token, alongside the
/// registered claims. The capability URLs tell holders where to refresh,
/// delegate authorization, and fetch verification keys. The same shape is
/// the `payload` of every login and refresh response, so a pending login
/// already names the endpoints to come back to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    /// Stable subject id, `urn:auth:<domain>:<email>`.
    pub id: String,
    /// Sort key of the login row this token was minted from.
    pub sk: String,
    pub refresh_url: String,
    pub authorize_url: String,
    pub certs_url: String,
    #[serde(flatten)]
    pub provider: ProviderClaims,
}

/// Full claim set of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub payload: TokenPayload,
}

/// Refresh session row, stored under sort key `jwt_refresh_<loginKey>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshDetail {
    /// Sort key of the login row to reissue from.
    pub sk: String,
    /// Opaque credential the refresh cookie must match.
    pub token: String,
    /// Unix seconds after which the session is dead.
    pub expires: i64,
    /// The rendered `Set-Cookie` value handed to the client.
    pub header: String,
}
