//! Authentication extractor
//!
//! Verifies the access token carried by a request and exposes the account it
//! was issued for.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{JwtError, TokenKeys, TokenType};
use crate::error::ApiError;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Account identified by a valid access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: Option<String>,
}

/// Extractor for authenticated users
///
/// The token is read from the `Authorization: Bearer` header, falling back to
/// the `accessToken` cookie. Only signature, expiry and token type are checked.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, user {}", user.user_id)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<TokenKeys>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
        {
            Ok(TypedHeader(Authorization(bearer))) => bearer.token().to_string(),
            Err(_) => {
                let jar = CookieJar::from_headers(&parts.headers);
                jar.get(ACCESS_TOKEN_COOKIE)
                    .map(|cookie| cookie.value().to_string())
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| ApiError::Unauthorized("Unauthorized request".to_string()))?
            }
        };

        let keys = Arc::<TokenKeys>::from_ref(state);

        let claims = keys.verify(&token, TokenType::Access).map_err(|e| {
            match e {
                JwtError::TokenExpired => tracing::debug!("Access token expired"),
                ref other => tracing::debug!(error = %other, "Access token rejected"),
            }
            ApiError::Unauthorized("Invalid access token".to_string())
        })?;

        let user_id = claims
            .user_id()
            .map_err(|_| ApiError::Unauthorized("Invalid access token".to_string()))?;

        Ok(AuthenticatedUser {
            user_id,
            username: claims.username,
        })
    }
}
