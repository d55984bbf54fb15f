use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use authgate::modules::keys::service::KeyService;
use authgate::modules::login::model::ProviderClaims;
use authgate::modules::token::model::{AccessClaims, TokenPayload};
use authgate::modules::token::service::{
    TOKEN_TTL_SECS, TokenService, decode_claims_unverified, generate_audience,
};
use authgate::storage::memory::MemorySecretStore;

mod common;

fn payload(id: &str) -> TokenPayload {
    TokenPayload {
        id: id.to_string(),
        sk: format!("login_EMAIL_{id}"),
        refresh_url: "https://auth.test/auth/api/v1/jwt/refresh".to_string(),
        authorize_url: "https://auth.test/auth/api/v1/jwt/authorize".to_string(),
        certs_url: "https://auth.test/auth/api/v1/jwt/certs".to_string(),
        provider: ProviderClaims::Email {
            email: "user@example.com".to_string(),
        },
    }
}

#[tokio::test]
async fn test_issued_token_verifies_against_public_pem() {
    let secrets = MemorySecretStore::new();
    let keys = KeyService::get_or_create_keys(&secrets, "auth.test")
        .await
        .unwrap();

    let id = generate_audience("auth.test", "user@example.com");
    let now = Utc::now();
    let token = TokenService::issue_token(&keys, "auth.test", payload(&id), now).unwrap();

    let key = DecodingKey::from_ec_pem(keys.public_key.pem.as_bytes()).unwrap();
    let mut validation = Validation::new(Algorithm::ES256);
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<AccessClaims>(&token, &key, &validation).unwrap();
    let claims = data.claims;

    assert_eq!(claims.sub, id);
    assert_eq!(claims.aud, generate_audience("auth.test", &id));
    // The issuer is the certs URL of the request that minted the token.
    assert_eq!(claims.iss, "https://auth.test/auth/api/v1/jwt/certs");
    assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
    assert_eq!(claims.payload.id, id);
    assert_eq!(
        claims.payload.provider.email(),
        "user@example.com"
    );
}

#[tokio::test]
async fn test_token_header_names_the_key() {
    let secrets = MemorySecretStore::new();
    let keys = KeyService::get_or_create_keys(&secrets, "auth.test")
        .await
        .unwrap();

    let id = generate_audience("auth.test", "user@example.com");
    let token = TokenService::issue_token(&keys, "auth.test", payload(&id), Utc::now()).unwrap();

    let header = jsonwebtoken::decode_header(&token).unwrap();
    assert_eq!(header.alg, Algorithm::ES256);
    assert_eq!(header.kid, keys.private_key.jwk.key_id);
}

#[test]
fn test_unverified_decode_reads_claims() {
    use data_encoding::BASE64URL_NOPAD;

    let claims = serde_json::json!({"sub": "abc", "exp": 123});
    let token = format!(
        "e30.{}.sig",
        BASE64URL_NOPAD.encode(claims.to_string().as_bytes())
    );

    let decoded: serde_json::Value = decode_claims_unverified(&token).unwrap();
    assert_eq!(decoded["sub"], "abc");
    assert_eq!(decoded["exp"], 123);
}

#[test]
fn test_unverified_decode_rejects_wrong_shape() {
    assert!(decode_claims_unverified::<serde_json::Value>("onlyonepart").is_err());
    assert!(decode_claims_unverified::<serde_json::Value>("a.b").is_err());
    assert!(decode_claims_unverified::<serde_json::Value>("a.b.c.d").is_err());
    assert!(decode_claims_unverified::<serde_json::Value>("a.!!!.c").is_err());
}

#[test]
fn test_capability_urls_strip_trailing_refresh() {
    let direct = common::ctx("auth.test", "POST", "/auth/api/v1/jwt");
    let via_refresh = common::ctx("auth.test", "POST", "/auth/api/v1/jwt/refresh");

    let a = TokenService::capability_urls(&direct);
    let b = TokenService::capability_urls(&via_refresh);

    assert_eq!(a.refresh_url, b.refresh_url);
    assert_eq!(a.authorize_url, b.authorize_url);
    assert_eq!(a.certs_url, b.certs_url);
    assert_eq!(a.certs_url, "https://auth.test/auth/api/v1/jwt/certs");
}
