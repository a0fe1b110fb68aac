//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::TokenKeys;
use crate::storage::Staging;
use crate::users::UserService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub token_keys: Arc<TokenKeys>,
    pub staging: Staging,
    /// Mark session cookies `Secure` (production only)
    pub secure_cookies: bool,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        user_service: Arc<UserService>,
        token_keys: Arc<TokenKeys>,
        staging: Staging,
        secure_cookies: bool,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            user_service,
            token_keys,
            staging,
            secure_cookies,
            max_upload_bytes,
        }
    }
}

impl FromRef<AppState> for Arc<UserService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.user_service.clone()
    }
}

impl FromRef<AppState> for Arc<TokenKeys> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.token_keys.clone()
    }
}
