use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{authorize, certs, introspect, login, providers, refresh};

pub fn init_jwt_router() -> Router<AppState> {
    Router::new()
        .route("/", post(login).get(introspect))
        .route("/refresh", post(refresh))
        .route("/authorize", post(authorize))
        .route("/certs", get(certs))
        .route("/providers", get(providers))
}
