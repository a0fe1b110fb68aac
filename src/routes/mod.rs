//! Route definitions for the ProfileVault API

mod auth;
mod user;

use axum::{extract::DefaultBodyLimit, routing::get, Router};

use crate::handlers::{healthcheck, root};
use crate::middleware;
use crate::state::AppState;

pub use auth::auth_routes;
pub use user::user_routes;

/// Base path of the versioned API
pub const API_PREFIX: &str = "/api/v1";

/// Assemble the application router with its middleware stack.
/// CORS is layered on by the binary since it depends on deployment config.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    let api = Router::new()
        .route("/healthcheck", get(healthcheck))
        .nest("/users", user_routes().merge(auth_routes()));

    Router::new()
        .route("/", get(root))
        .nest(API_PREFIX, api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}
