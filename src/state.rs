use std::sync::Arc;
use std::time::Duration;

use crate::config::cors::CorsConfig;
use crate::config::database::init_db_pool;
use crate::config::email::EmailConfig;
use crate::config::service::ServiceConfig;
use crate::middleware::auth::AuthzCache;
use crate::modules::login::federated::{FederatedVerifier, GoogleVerifier};
use crate::modules::verify::cache::JwksCache;
use crate::storage::postgres::{PgRowStore, PgSecretStore};
use crate::storage::{RowStore, SecretStore};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::email::{LettreMailer, Mailer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RowStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub mailer: Arc<dyn Mailer>,
    pub federated: Arc<dyn FederatedVerifier>,
    pub clock: Arc<dyn Clock>,
    /// Shared outbound client; every request carries the configured timeout.
    pub http: reqwest::Client,
    pub jwks_cache: Arc<JwksCache>,
    pub authz_cache: Arc<AuthzCache>,
    pub service_config: ServiceConfig,
    pub email_config: EmailConfig,
    pub cors_config: CorsConfig,
}

pub async fn init_app_state() -> AppState {
    let pool = init_db_pool().await;
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let service_config = ServiceConfig::from_env();
    let email_config = EmailConfig::from_env();
    let cors_config = CorsConfig::from_env();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(service_config.http_timeout_secs))
        .build()
        .expect("Failed to build HTTP client");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    AppState {
        store: Arc::new(PgRowStore::new(pool.clone())),
        secrets: Arc::new(PgSecretStore::new(pool)),
        mailer: Arc::new(LettreMailer::new(email_config.clone())),
        federated: Arc::new(GoogleVerifier::new(
            http.clone(),
            service_config.google_client_id.clone(),
        )),
        clock: clock.clone(),
        http,
        jwks_cache: Arc::new(JwksCache::new(clock.clone())),
        authz_cache: Arc::new(AuthzCache::new(clock)),
        service_config,
        email_config,
        cors_config,
    }
}
