use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use tracing::instrument;
use utoipa::ToSchema;

use crate::middleware::auth::AuthUser;
use crate::modules::token::model::AccessClaims;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::http::{REFRESH_HEADER, RequestContext};
use crate::validator::ValidatedJson;

use super::model::{
    AuthorizeRequest, AuthorizeResponse, LoginRequest, ProvidersResponse, TokenResponse,
};
use super::service::{LoginOutcome, LoginService};

#[derive(ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

fn outcome_headers(outcome: &LoginOutcome) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = &outcome.set_cookie {
        headers.insert(
            axum::http::header::SET_COOKIE,
            HeaderValue::from_str(cookie).map_err(AppError::internal)?,
        );
    }
    if let Some(marker) = &outcome.refresh_marker {
        headers.insert(
            REFRESH_HEADER,
            HeaderValue::from_str(marker).map_err(AppError::internal)?,
        );
    }
    Ok(headers)
}

/// Log in with a provider and receive an access token
#[utoipa::path(
    post,
    path = "/auth/api/v1/jwt",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login processed; token present once verified", body = TokenResponse),
        (status = 401, description = "Provider rejected the credential", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tokens"
)]
#[instrument(skip(state, ctx, request))]
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<(HeaderMap, Json<TokenResponse>), AppError> {
    let outcome = LoginService::login(&state, &ctx, request).await?;
    let headers = outcome_headers(&outcome)?;
    Ok((headers, Json(outcome.response)))
}

/// Rotate the refresh session and reissue the access token
#[utoipa::path(
    post,
    path = "/auth/api/v1/jwt/refresh",
    responses(
        (status = 200, description = "New token and rotated cookie", body = TokenResponse),
        (status = 403, description = "Refresh credential rejected", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tokens"
)]
#[instrument(skip(state, ctx))]
pub async fn refresh(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<(HeaderMap, Json<TokenResponse>), AppError> {
    let outcome = LoginService::refresh(&state, &ctx).await?;
    let headers = outcome_headers(&outcome)?;
    Ok((headers, Json(outcome.response)))
}

/// Verify a token on behalf of a delegating service
#[utoipa::path(
    post,
    path = "/auth/api/v1/jwt/authorize",
    request_body = AuthorizeRequest,
    responses(
        (status = 200, description = "Verdict; failures carry a detail string", body = AuthorizeResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Tokens"
)]
#[instrument(skip(state, request))]
pub async fn authorize(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<AuthorizeRequest>,
) -> Json<AuthorizeResponse> {
    Json(LoginService::authorize(&state, request).await)
}

/// Published JSON Web Key Set
#[utoipa::path(
    get,
    path = "/auth/api/v1/jwt/certs",
    responses(
        (status = 200, description = "Public verification keys"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tokens"
)]
#[instrument(skip(state))]
pub async fn certs(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(LoginService::certs(&state).await?))
}

/// Provider discovery
#[utoipa::path(
    get,
    path = "/auth/api/v1/jwt/providers",
    responses(
        (status = 200, description = "Configured login providers", body = ProvidersResponse)
    ),
    tag = "Tokens"
)]
#[instrument(skip(state))]
pub async fn providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(LoginService::providers(&state))
}

/// Claims of the presented access token, fully verified
#[utoipa::path(
    get,
    path = "/auth/api/v1/jwt",
    responses(
        (status = 200, description = "Verified claims"),
        (status = 401, description = "Token rejected", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tokens"
)]
#[instrument(skip(auth))]
pub async fn introspect(auth: AuthUser) -> (StatusCode, Json<AccessClaims>) {
    (StatusCode::OK, Json(auth.0))
}
