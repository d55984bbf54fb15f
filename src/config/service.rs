use std::env;

/// Token service settings.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Domain segment used in `urn:auth:<domain>:...` identifiers. Must
    /// appear in the issuer hostname for tokens to verify.
    pub domain: String,
    /// Display name used as the one-time-code issuer and in emails.
    pub app_name: String,
    /// OAuth client id expected in Google id tokens. Google login is
    /// disabled when unset.
    pub google_client_id: Option<String>,
    /// Lifetime of the refresh cookie in seconds.
    pub refresh_max_age_secs: i64,
    /// Timeout applied to every outbound HTTP call.
    pub http_timeout_secs: u64,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            domain: env::var("AUTH_DOMAIN").unwrap_or_else(|_| "localhost".to_string()),
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "Authgate".to_string()),
            google_client_id: env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty()),
            refresh_max_age_secs: env::var("REFRESH_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(31_557_600),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}
