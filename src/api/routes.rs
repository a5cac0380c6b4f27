use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/tokens", post(handlers::issue_token))
        .route("/tokens/introspect", post(handlers::introspect_token))
        .route("/tokens/revoke", post(handlers::revoke_token))
        .route("/users", post(handlers::create_user))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
