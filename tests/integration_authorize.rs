use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{Json, Router, extract::State, routing::post};
use chrono::{TimeZone, Utc};
use data_encoding::BASE64URL_NOPAD;
use serde_json::{Value, json};

use authgate::middleware::auth::{AuthzCache, AuthzDecision, AuthzError, authorize, fingerprint};
use authgate::utils::clock::SystemClock;

mod common;

use common::{FixedClock, ctx};

struct DelegateState {
    calls: AtomicUsize,
    response: Mutex<Value>,
    last_body: Mutex<Option<Value>>,
}

async fn delegate_handler(
    State(state): State<Arc<DelegateState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.calls.fetch_add(1, Ordering::SeqCst);
    *state.last_body.lock().unwrap() = Some(body);
    Json(state.response.lock().unwrap().clone())
}

async fn spawn_delegate(response: Value) -> (String, Arc<DelegateState>) {
    let state = Arc::new(DelegateState {
        calls: AtomicUsize::new(0),
        response: Mutex::new(response),
        last_body: Mutex::new(None),
    });

    let app = Router::new()
        .route("/authorize", post(delegate_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/authorize"), state)
}

/// A syntactically valid token whose claims name the delegate. The
/// signature is junk; the delegate owns the decision.
fn make_token(authorize_url: &str, exp: i64, sub: &str) -> String {
    let claims = json!({
        "sub": sub,
        "exp": exp,
        "authorizeUrl": authorize_url,
    });
    format!(
        "e30.{}.sig",
        BASE64URL_NOPAD.encode(claims.to_string().as_bytes())
    )
}

fn request_ctx(token: &str, method: &str, path: &str) -> authgate::utils::http::RequestContext {
    let mut request_ctx = ctx("svc.test", method, path);
    request_ctx.authorization = Some(format!("jwt {token}"));
    request_ctx
}

#[tokio::test]
async fn test_unsupported_scheme_is_rejected() {
    let cache = AuthzCache::new(Arc::new(SystemClock));
    let http = reqwest::Client::new();
    let request_ctx = request_ctx("whatever", "GET", "/r");

    let err = authorize(&http, &cache, &request_ctx, "basic", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::UnsupportedScheme(_)));
}

#[tokio::test]
async fn test_positive_decision_is_cached() {
    let (url, delegate) = spawn_delegate(json!({
        "authorized": true,
        "payload": {"role": "reader"},
    }))
    .await;

    let cache = AuthzCache::new(Arc::new(SystemClock));
    let http = reqwest::Client::new();
    let token = make_token(&url, Utc::now().timestamp() + 3600, "urn:auth:svc.test:u");
    let scopes = vec!["read".to_string()];
    let request_ctx = request_ctx(&token, "GET", "/r");

    let decision = authorize(&http, &cache, &request_ctx, "jwt", &scopes)
        .await
        .unwrap();
    assert_eq!(decision.id, "urn:auth:svc.test:u");
    assert_eq!(decision.payload["role"], "reader");
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);

    // The delegate saw the full request shape.
    let body = delegate.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["token"], token.as_str());
    assert_eq!(body["method"], "GET");
    assert_eq!(body["host"], "svc.test");
    assert_eq!(body["path"], "/r");
    assert_eq!(body["scopes"], json!(["read"]));

    // Second identical request never leaves the process.
    authorize(&http, &cache, &request_ctx, "jwt", &scopes)
        .await
        .unwrap();
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_denials_are_not_cached() {
    let (url, delegate) = spawn_delegate(json!({"authorized": false})).await;

    let cache = AuthzCache::new(Arc::new(SystemClock));
    let http = reqwest::Client::new();
    let token = make_token(&url, Utc::now().timestamp() + 3600, "u");
    let request_ctx = request_ctx(&token, "GET", "/r");

    for _ in 0..2 {
        let err = authorize(&http, &cache, &request_ctx, "jwt", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Denied));
    }
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_expired_cache_entry_falls_through_to_the_delegate() {
    let (url, delegate) = spawn_delegate(json!({"authorized": false})).await;

    let now = Utc.timestamp_opt(1_800_000_000, 0).unwrap();
    let clock = Arc::new(FixedClock::at(now));
    let cache = AuthzCache::new(clock);
    let http = reqwest::Client::new();

    let exp = now.timestamp() - 10;
    let token = make_token(&url, exp, "u");
    let request_ctx = request_ctx(&token, "GET", "/r");

    // A stale positive decision from an earlier run of this token.
    let fp = fingerprint(&token, "GET", "/r");
    cache.insert(
        fp.clone(),
        AuthzDecision {
            id: "u".to_string(),
            payload: Value::Null,
            expires: exp,
        },
    );

    let err = authorize(&http, &cache, &request_ctx, "jwt", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::Denied));
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);
    // The stale entry was not refreshed by the denial.
    assert!(cache.get(&fp).is_none());
}

#[tokio::test]
async fn test_remote_error_is_surfaced() {
    let (url, _delegate) = spawn_delegate(json!({
        "authorized": false,
        "error": "tenant suspended",
    }))
    .await;

    let cache = AuthzCache::new(Arc::new(SystemClock));
    let http = reqwest::Client::new();
    let token = make_token(&url, Utc::now().timestamp() + 3600, "u");
    let request_ctx = request_ctx(&token, "GET", "/r");

    let err = authorize(&http, &cache, &request_ctx, "jwt", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::Remote(_)));
}

#[tokio::test]
async fn test_token_without_authorize_url_is_malformed() {
    let cache = AuthzCache::new(Arc::new(SystemClock));
    let http = reqwest::Client::new();
    let claims = json!({"sub": "u", "exp": 0});
    let token = format!(
        "e30.{}.sig",
        BASE64URL_NOPAD.encode(claims.to_string().as_bytes())
    );
    let request_ctx = request_ctx(&token, "GET", "/r");

    let err = authorize(&http, &cache, &request_ctx, "jwt", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::MalformedToken));
}
