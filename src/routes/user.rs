//! User route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::user::{get_current_user, register_user};
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_user))
        .route("/current-user", get(get_current_user))
}
