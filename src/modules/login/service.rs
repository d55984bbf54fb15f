use tracing::instrument;

use crate::modules::keys::service::KeyService;
use crate::modules::token::model::TokenPayload;
use crate::modules::token::service::{TokenService, generate_audience};
use crate::modules::totp::model::VerificationMethod;
use crate::modules::totp::service::TotpService;
use crate::modules::verify::service::VerifyService;
use crate::state::AppState;
use crate::storage::{create_row, get_row};
use crate::utils::errors::AppError;
use crate::utils::http::RequestContext;

use super::model::{
    AuthorizeRequest, AuthorizeResponse, LoginDetail, LoginRequest, Provider, ProviderClaims,
    ProviderDetail, ProvidersResponse, TokenResponse,
};

/// Sort key of the login row for one provider identity.
pub fn login_sk(provider: Provider, id: &str) -> String {
    format!("login_{provider}_{id}")
}

/// What a login or refresh hands back to the controller: the body plus the
/// headers that bind the refresh session to the client.
#[derive(Debug)]
pub struct LoginOutcome {
    pub response: TokenResponse,
    pub set_cookie: Option<String>,
    pub refresh_marker: Option<String>,
}

pub struct LoginService;

impl LoginService {
    /// Runs a provider login end to end.
    ///
    /// The login row is persisted whether or not verification succeeded, so
    /// a half-finished email login is visible. Tokens and refresh cookies
    /// are only minted once the identity is verified.
    #[instrument(skip(state, ctx, request), fields(provider = %request.provider()))]
    pub async fn login(
        state: &AppState,
        ctx: &RequestContext,
        request: LoginRequest,
    ) -> Result<LoginOutcome, AppError> {
        let email = request.email().trim().to_lowercase();
        let provider = request.provider();
        let id = generate_audience(&state.service_config.domain, &email);
        let sk = login_sk(provider, &id);

        let (claims, verified, method) = match request {
            LoginRequest::Google(r) => {
                state.federated.verify(&email, &r.id_token).await?;
                (
                    ProviderClaims::Google {
                        email: email.clone(),
                        name: r.name,
                        photo_url: r.photo_url,
                    },
                    true,
                    VerificationMethod::None,
                )
            }
            LoginRequest::Email(r) => {
                let claims = ProviderClaims::Email {
                    email: email.clone(),
                };
                match r.code.as_deref().filter(|c| !c.is_empty()) {
                    Some(code) => {
                        let method = TotpService::verify_code(
                            state.store.as_ref(),
                            &state.service_config.app_name,
                            &id,
                            &email,
                            code,
                        )
                        .await?;
                        (claims, true, method)
                    }
                    None => {
                        let method = TotpService::send_code(
                            state.store.as_ref(),
                            state.mailer.as_ref(),
                            &state.service_config.app_name,
                            &id,
                            &email,
                        )
                        .await?;
                        (claims, false, method)
                    }
                }
            }
        };

        let detail = LoginDetail {
            id: id.clone(),
            provider,
            verified,
            verification_method: method,
            payload: claims.clone(),
        };
        create_row(state.store.as_ref(), &id, &sk, &detail, true).await?;

        let urls = TokenService::capability_urls(ctx);
        let payload = TokenPayload {
            id: id.clone(),
            sk: sk.clone(),
            refresh_url: urls.refresh_url,
            authorize_url: urls.authorize_url,
            certs_url: urls.certs_url,
            provider: claims,
        };

        if !verified {
            return Ok(LoginOutcome {
                response: TokenResponse {
                    id,
                    provider,
                    verified,
                    verification_method: method,
                    payload,
                    token: None,
                },
                set_cookie: None,
                refresh_marker: None,
            });
        }

        let now = state.clock.now();
        let keys = KeyService::get_or_create_keys(
            state.secrets.as_ref(),
            &state.service_config.domain,
        )
        .await?;

        let refresh = TokenService::issue_refresh_token(
            state.store.as_ref(),
            &id,
            &sk,
            &ctx.host,
            None,
            state.service_config.refresh_max_age_secs,
            now,
        )
        .await?;

        let token = TokenService::issue_token(
            &keys,
            &state.service_config.domain,
            payload.clone(),
            now,
        )?;

        Ok(LoginOutcome {
            response: TokenResponse {
                id,
                provider,
                verified,
                verification_method: method,
                payload,
                token: Some(token),
            },
            set_cookie: Some(refresh.detail.header),
            refresh_marker: ctx.refresh_marker.clone(),
        })
    }

    /// Rotates a refresh session and reissues the access token.
    ///
    /// Fails closed: any problem with the presented token, cookie, or
    /// session row is a 403 with no detail about which check missed.
    #[instrument(skip(state, ctx))]
    pub async fn refresh(state: &AppState, ctx: &RequestContext) -> Result<LoginOutcome, AppError> {
        let now = state.clock.now();
        let (claims, refresh_row) =
            TokenService::fetch_refresh_row(state.store.as_ref(), ctx, now).await?;

        let login = get_row::<LoginDetail>(
            state.store.as_ref(),
            &claims.payload.id,
            &refresh_row.detail.sk,
        )
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| {
            AppError::forbidden(anyhow::anyhow!("refresh session has no login record"))
        })?;

        let urls = TokenService::capability_urls(ctx);
        let keys = KeyService::get_or_create_keys(
            state.secrets.as_ref(),
            &state.service_config.domain,
        )
        .await?;

        let rotated = TokenService::issue_refresh_token(
            state.store.as_ref(),
            &login.detail.id,
            &refresh_row.detail.sk,
            &ctx.host,
            Some(refresh_row.detail.token),
            state.service_config.refresh_max_age_secs,
            now,
        )
        .await?;

        let payload = TokenPayload {
            id: login.detail.id.clone(),
            sk: refresh_row.detail.sk,
            refresh_url: urls.refresh_url,
            authorize_url: urls.authorize_url,
            certs_url: urls.certs_url,
            provider: login.detail.payload,
        };
        let token = TokenService::issue_token(
            &keys,
            &state.service_config.domain,
            payload.clone(),
            now,
        )?;

        Ok(LoginOutcome {
            response: TokenResponse {
                id: login.detail.id,
                provider: login.detail.provider,
                verified: login.detail.verified,
                verification_method: login.detail.verification_method,
                payload,
                token: Some(token),
            },
            set_cookie: Some(rotated.detail.header),
            refresh_marker: Some("true".to_string()),
        })
    }

    /// Verifies a token on behalf of a delegating caller. Never errors; a
    /// failed verification is an `authorized: false` verdict with a reason.
    #[instrument(skip(state, request))]
    pub async fn authorize(state: &AppState, request: AuthorizeRequest) -> AuthorizeResponse {
        match VerifyService::verify(
            &state.http,
            &state.jwks_cache,
            state.secrets.as_ref(),
            &state.service_config.domain,
            &request.token,
        )
        .await
        {
            Ok(claims) => AuthorizeResponse {
                authorized: true,
                id: Some(claims.sub.clone()),
                payload: serde_json::to_value(&claims.payload).ok(),
                detail: None,
            },
            Err(e) => AuthorizeResponse {
                authorized: false,
                id: None,
                payload: None,
                detail: Some(e.to_string()),
            },
        }
    }

    /// The published key set for this deployment.
    pub async fn certs(state: &AppState) -> Result<serde_json::Value, AppError> {
        let keys = KeyService::get_or_create_keys(
            state.secrets.as_ref(),
            &state.service_config.domain,
        )
        .await?;
        Ok(KeyService::public_jwk_set(&keys))
    }

    /// Provider discovery, derived from configuration.
    pub fn providers(state: &AppState) -> ProvidersResponse {
        ProvidersResponse {
            google: ProviderDetail {
                enabled: state.service_config.google_client_id.is_some(),
                name: Some("Google".to_string()),
                client_id: state.service_config.google_client_id.clone(),
            },
            email: ProviderDetail {
                enabled: state.email_config.enabled,
                name: Some(state.service_config.app_name.clone()),
                client_id: None,
            },
        }
    }
}
