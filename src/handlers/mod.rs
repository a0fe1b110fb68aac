//! API handlers for the ProfileVault backend

pub mod auth;
pub mod healthcheck;
pub mod user;

pub use auth::{login_user, logout_user, refresh_access_token};
pub use healthcheck::{healthcheck, root};
pub use user::{get_current_user, register_user};

// Re-export AuthenticatedUser from middleware for handler use
pub use crate::middleware::auth::AuthenticatedUser;
