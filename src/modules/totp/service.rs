use axum::http::StatusCode;
use thiserror::Error;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::instrument;

use crate::storage::{RowStore, StoreError, create_row, get_row, update_row};
use crate::utils::email::{MailError, Mailer};
use crate::utils::errors::AppError;

use super::model::{TotpDetail, VerificationMethod};

/// Sort key of the enrollment row.
pub const TOTP_SK: &str = "totp";

/// Accepted clock drift in 30-second steps, either side of now.
/// Emailed codes get a wide window to cover delivery latency.
const AUTHENTICATOR_SKEW: u8 = 4;
const EMAIL_SKEW: u8 = 10;

const CODE_DIGITS: usize = 6;
const STEP_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum TotpError {
    #[error("no one-time-code enrollment for this account")]
    NotConfigured,

    #[error("stored one-time-code secret is invalid")]
    BadSecret,

    #[error("invalid code")]
    InvalidCode,

    #[error("one-time-code engine error: {0}")]
    Engine(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Send(#[from] MailError),
}

impl From<TotpError> for AppError {
    fn from(err: TotpError) -> Self {
        match err {
            TotpError::InvalidCode | TotpError::NotConfigured => {
                AppError::new(StatusCode::UNAUTHORIZED, err)
            }
            TotpError::Send(_) => AppError::dependency(err),
            _ => AppError::internal(err),
        }
    }
}

fn build_totp(
    secret_b32: &str,
    skew: u8,
    issuer: &str,
    account: &str,
) -> Result<TOTP, TotpError> {
    let secret = Secret::Encoded(secret_b32.to_string())
        .to_bytes()
        .map_err(|_| TotpError::BadSecret)?;

    TOTP::new(
        Algorithm::SHA1,
        CODE_DIGITS,
        skew,
        STEP_SECS,
        secret,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| TotpError::Engine(e.to_string()))
}

/// Checks `code` against `secret_b32` at the given unix time. Split out so
/// tests can pin the clock.
pub fn code_matches(
    secret_b32: &str,
    code: &str,
    skew: u8,
    at_unix: u64,
    issuer: &str,
    account: &str,
) -> Result<bool, TotpError> {
    Ok(build_totp(secret_b32, skew, issuer, account)?.check(code, at_unix))
}

/// Generates the code valid at the given unix time.
pub fn code_at(
    secret_b32: &str,
    at_unix: u64,
    issuer: &str,
    account: &str,
) -> Result<String, TotpError> {
    Ok(build_totp(secret_b32, EMAIL_SKEW, issuer, account)?.generate(at_unix))
}

pub struct TotpService;

impl TotpService {
    /// Ensures the account has an enrollment and delivers a code if one is
    /// needed.
    ///
    /// Enrollment creation is create-if-absent, so two racing logins for a
    /// new account agree on a single secret. Accounts that verified through
    /// an authenticator app get no email; their app already shows the code.
    #[instrument(skip(store, mailer))]
    pub async fn send_code(
        store: &dyn RowStore,
        mailer: &dyn Mailer,
        app_name: &str,
        id: &str,
        email: &str,
    ) -> Result<VerificationMethod, TotpError> {
        let detail = match create_row(
            store,
            id,
            TOTP_SK,
            &TotpDetail {
                secret: new_secret(),
                verified: false,
                authenticator: false,
            },
            false,
        )
        .await
        {
            Ok(row) => row.detail,
            Err(StoreError::Conflict { .. }) => get_row::<TotpDetail>(store, id, TOTP_SK)
                .await?
                .ok_or(TotpError::NotConfigured)?
                .detail,
            Err(e) => return Err(e.into()),
        };

        if detail.verified && detail.authenticator {
            return Ok(VerificationMethod::Authenticator);
        }

        let code = build_totp(&detail.secret, EMAIL_SKEW, app_name, email)?
            .generate_current()
            .map_err(|e| TotpError::Engine(e.to_string()))?;

        mailer.send_code(email, app_name, &code).await?;

        Ok(VerificationMethod::Email)
    }

    /// Validates a submitted code and marks the enrollment verified on
    /// first success.
    #[instrument(skip(store, code))]
    pub async fn verify_code(
        store: &dyn RowStore,
        app_name: &str,
        id: &str,
        email: &str,
        code: &str,
    ) -> Result<VerificationMethod, TotpError> {
        let mut row = get_row::<TotpDetail>(store, id, TOTP_SK)
            .await?
            .ok_or(TotpError::NotConfigured)?;

        let skew = if row.detail.authenticator {
            AUTHENTICATOR_SKEW
        } else {
            EMAIL_SKEW
        };

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| TotpError::Engine(e.to_string()))?
            .as_secs();

        if !code_matches(&row.detail.secret, code, skew, now, app_name, email)? {
            return Err(TotpError::InvalidCode);
        }

        let method = if row.detail.authenticator {
            VerificationMethod::Authenticator
        } else {
            VerificationMethod::Email
        };

        if !row.detail.verified {
            row.detail.verified = true;
            update_row(store, row).await?;
        }

        Ok(method)
    }
}

fn new_secret() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    Secret::Raw(bytes.to_vec()).to_encoded().to_string()
}
