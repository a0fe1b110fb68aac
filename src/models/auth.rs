//! Authentication models for ProfileVault

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::UserResponse;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Text fields of the registration form
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterUserRequest {
    #[validate(custom = "not_blank")]
    pub full_name: String,
    #[validate(custom = "not_blank")]
    pub username: String,
    #[validate(custom = "not_blank")]
    pub email: String,
    #[validate(custom = "not_blank")]
    pub password: String,
}

/// Login request; either username or email identifies the account
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "require_identifier", skip_on_field_errors = false))]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[validate(custom = "not_blank")]
    pub password: String,
}

/// Refresh token request; the cookie takes precedence when both are present
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

/// Freshly issued access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Login response payload
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn require_identifier(request: &LoginRequest) -> Result<(), ValidationError> {
    let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.trim().is_empty());

    if present(&request.username) || present(&request.email) {
        Ok(())
    } else {
        Err(ValidationError::new("identifier_required"))
    }
}
