use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::modules::token::model::TokenPayload;
use crate::modules::totp::model::VerificationMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Google,
    Email,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Google => write!(f, "GOOGLE"),
            Provider::Email => write!(f, "EMAIL"),
        }
    }
}

/// Login request, one variant per provider. The `provider` field picks the
/// variant; an unknown provider fails deserialization before any handler
/// logic runs.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "provider")]
pub enum LoginRequest {
    #[serde(rename = "GOOGLE")]
    Google(GoogleLoginRequest),
    #[serde(rename = "EMAIL")]
    Email(EmailLoginRequest),
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            LoginRequest::Google(r) => r.validate(),
            LoginRequest::Email(r) => r.validate(),
        }
    }
}

impl LoginRequest {
    pub fn email(&self) -> &str {
        match self {
            LoginRequest::Google(r) => &r.email,
            LoginRequest::Email(r) => &r.email,
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            LoginRequest::Google(_) => Provider::Google,
            LoginRequest::Email(_) => Provider::Email,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "idToken is required"))]
    pub id_token: String,
    pub name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailLoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    /// One-time code from a previous attempt. Absent on the first call,
    /// which triggers code delivery.
    pub code: Option<String>,
}

/// Provider claims carried in tokens and login rows. Credential material
/// (id tokens, one-time codes) never lands here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "provider")]
pub enum ProviderClaims {
    #[serde(rename = "GOOGLE", rename_all = "camelCase")]
    Google {
        email: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        photo_url: Option<String>,
    },
    #[serde(rename = "EMAIL")]
    Email { email: String },
}

impl ProviderClaims {
    pub fn email(&self) -> &str {
        match self {
            ProviderClaims::Google { email, .. } => email,
            ProviderClaims::Email { email } => email,
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            ProviderClaims::Google { .. } => Provider::Google,
            ProviderClaims::Email { .. } => Provider::Email,
        }
    }
}

/// Account login record, stored under sort key `login_<PROVIDER>_<id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginDetail {
    pub id: String,
    pub provider: Provider,
    pub verified: bool,
    pub verification_method: VerificationMethod,
    pub payload: ProviderClaims,
}

/// Login and refresh response body. The payload is the full claim set a
/// token would carry, capability URLs included, so a pending caller knows
/// where to come back to; `token` is absent while verification is still
/// pending.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub id: String,
    pub provider: Provider,
    pub verified: bool,
    pub verification_method: VerificationMethod,
    pub payload: TokenPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AuthorizeRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
}

/// Authorization verdict. Always 200; failures carry `detail` instead of an
/// error status so delegating callers get a uniform shape.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthorizeResponse {
    pub authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProviderDetail {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProvidersResponse {
    #[serde(rename = "GOOGLE")]
    pub google: ProviderDetail,
    #[serde(rename = "EMAIL")]
    pub email: ProviderDetail,
}
