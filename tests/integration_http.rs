use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use authgate::router::init_router;

mod common;

use common::test_state;

const DOMAIN: &str = "auth.test";

fn app() -> Router {
    init_router(test_state(DOMAIN).state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("host", DOMAIN)
        .header("x-forwarded-proto", "https")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header("host", DOMAIN)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_providers_reports_configuration() {
    let response = app()
        .oneshot(get("/auth/api/v1/jwt/providers"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["GOOGLE"]["enabled"], true);
    assert_eq!(body["GOOGLE"]["clientId"], "test-client-id");
    assert_eq!(body["EMAIL"]["enabled"], true);
}

#[tokio::test]
async fn test_certs_publishes_a_key_set() {
    let response = app().oneshot(get("/auth/api/v1/jwt/certs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kty"], "EC");
    assert!(keys[0]["kid"].is_string());
}

#[tokio::test]
async fn test_email_login_over_http_sets_no_cookie_until_verified() {
    let response = app()
        .oneshot(post_json(
            "/auth/api/v1/jwt",
            json!({"provider": "EMAIL", "email": "user@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let body = body_json(response).await;
    assert_eq!(body["verified"], false);
    assert_eq!(body["verificationMethod"], "EMAIL");
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn test_google_login_over_http_sets_cookie_and_echoes_marker() {
    let mut request = post_json(
        "/auth/api/v1/jwt",
        json!({"provider": "GOOGLE", "email": "user@example.com", "idToken": "tok"}),
    );
    request
        .headers_mut()
        .insert("x-auth-refresh", "1".parse().unwrap());

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie")
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("__Secure-ag_rt_"));
    assert_eq!(
        response.headers().get("x-auth-refresh").unwrap(),
        "1"
    );

    let body = body_json(response).await;
    assert_eq!(body["verified"], true);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn test_unknown_provider_is_a_bad_request() {
    let response = app()
        .oneshot(post_json(
            "/auth/api/v1/jwt",
            json!({"provider": "FACEBOOK", "email": "user@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_email_fails_validation() {
    let response = app()
        .oneshot(post_json(
            "/auth/api/v1/jwt",
            json!({"provider": "EMAIL", "email": "not-an-email"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_refresh_without_credentials_is_forbidden() {
    let response = app()
        .oneshot(post_json("/auth/api/v1/jwt/refresh", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_authorize_never_errors_on_bad_tokens() {
    let response = app()
        .oneshot(post_json(
            "/auth/api/v1/jwt/authorize",
            json!({"token": "garbage"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["authorized"], false);
    assert!(body["detail"].is_string());
}
