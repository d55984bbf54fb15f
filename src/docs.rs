use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::modules::login::controller::ErrorResponse;
use crate::modules::login::model::{
    AuthorizeRequest, AuthorizeResponse, EmailLoginRequest, GoogleLoginRequest, LoginRequest,
    Provider, ProviderClaims, ProviderDetail, ProvidersResponse, TokenResponse,
};
use crate::modules::token::model::TokenPayload;
use crate::modules::totp::model::VerificationMethod;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::login::controller::login,
        crate::modules::login::controller::refresh,
        crate::modules::login::controller::authorize,
        crate::modules::login::controller::certs,
        crate::modules::login::controller::providers,
        crate::modules::login::controller::introspect,
    ),
    components(
        schemas(
            LoginRequest,
            GoogleLoginRequest,
            EmailLoginRequest,
            TokenResponse,
            TokenPayload,
            AuthorizeRequest,
            AuthorizeResponse,
            ProvidersResponse,
            ProviderDetail,
            Provider,
            ProviderClaims,
            VerificationMethod,
            ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Tokens", description = "Token issuance, verification and rotation")
    ),
    info(
        title = "Authgate API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Multi-provider login service issuing short-lived signed access tokens with rotating refresh credentials"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
