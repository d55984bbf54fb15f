#![allow(dead_code)]

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use authgate::config::cors::CorsConfig;
use authgate::config::email::EmailConfig;
use authgate::config::service::ServiceConfig;
use authgate::middleware::auth::AuthzCache;
use authgate::modules::login::federated::{FederatedError, FederatedVerifier};
use authgate::modules::verify::cache::JwksCache;
use authgate::state::AppState;
use authgate::storage::memory::{MemoryRowStore, MemorySecretStore};
use authgate::utils::clock::{Clock, SystemClock};
use authgate::utils::email::{MailError, Mailer};
use authgate::utils::http::RequestContext;

/// Mailer that records every send instead of talking to SMTP.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_code(
        &self,
        to_email: &str,
        _app_name: &str,
        code: &str,
    ) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), code.to_string()));
        Ok(())
    }
}

/// Federated verifier with a fixed verdict.
pub struct StubVerifier {
    pub accept: bool,
}

#[async_trait]
impl FederatedVerifier for StubVerifier {
    async fn verify(&self, _email: &str, _credential: &str) -> Result<String, FederatedError> {
        if self.accept {
            Ok("stub-subject-1".to_string())
        } else {
            Err(FederatedError::Rejected)
        }
    }
}

/// Settable clock for cache-expiry tests.
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    #[allow(dead_code)]
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

pub struct TestHarness {
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
}

/// An [`AppState`] over in-memory stores, a recording mailer, and an
/// accepting federated verifier. Uses the system clock so freshly issued
/// tokens verify as unexpired.
pub fn test_state(domain: &str) -> TestHarness {
    test_state_with_verifier(domain, StubVerifier { accept: true })
}

pub fn test_state_with_verifier(domain: &str, verifier: StubVerifier) -> TestHarness {
    let mailer = Arc::new(RecordingMailer::default());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let state = AppState {
        store: Arc::new(MemoryRowStore::new()),
        secrets: Arc::new(MemorySecretStore::new()),
        mailer: mailer.clone(),
        federated: Arc::new(verifier),
        clock: clock.clone(),
        http,
        jwks_cache: Arc::new(JwksCache::new(clock.clone())),
        authz_cache: Arc::new(AuthzCache::new(clock)),
        service_config: ServiceConfig {
            domain: domain.to_string(),
            app_name: "Authgate".to_string(),
            google_client_id: Some("test-client-id".to_string()),
            refresh_max_age_secs: 31_557_600,
            http_timeout_secs: 5,
        },
        email_config: EmailConfig {
            enabled: true,
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: "noreply@authgate.dev".to_string(),
            from_name: "Authgate".to_string(),
        },
        cors_config: CorsConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    };

    TestHarness { state, mailer }
}

/// A request context as the extractor would have built it.
pub fn ctx(host: &str, method: &str, path: &str) -> RequestContext {
    RequestContext {
        host: host.to_string(),
        ssl: true,
        method: method.to_string(),
        path: path.to_string(),
        authorization: None,
        cookie: None,
        refresh_marker: None,
    }
}
