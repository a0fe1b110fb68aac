//! Session routes

use axum::{routing::post, Router};

use crate::handlers::auth;
use crate::state::AppState;

/// Create session routes, nested under `/api/v1/users`
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login_user))
        .route("/refresh-token", post(auth::refresh_access_token))
        .route("/logout", post(auth::logout_user))
}
