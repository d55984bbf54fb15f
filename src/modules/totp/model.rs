use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How the account proved (or still has to prove) control of its email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationMethod {
    None,
    Email,
    Authenticator,
}

/// Per-account one-time-code enrollment, stored under sort key `totp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpDetail {
    /// Base32-encoded shared secret.
    pub secret: String,
    /// Set once any code has been accepted for this account.
    pub verified: bool,
    /// The account enrolled the secret in an authenticator app; codes are
    /// generated there instead of being emailed.
    pub authenticator: bool,
}
