//! Session HTTP handlers
//!
//! Login, token refresh and logout. Issued tokens are returned in the body and
//! mirrored into http-only cookies.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::{json, Value};

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::middleware::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::models::{ApiResponse, LoginRequest, LoginResponse, RefreshTokenRequest, TokenPair};
use crate::state::AppState;

/// POST /api/v1/users/login - Authenticate and open a session
pub async fn login_user(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), ApiError> {
    let Json(req) = payload?;
    let login = state.user_service.login(req).await?;

    let jar = with_session_cookies(
        jar,
        &login.access_token,
        &login.refresh_token,
        state.secure_cookies,
    );

    Ok((
        jar,
        ApiResponse::new(StatusCode::OK, login, "User logged in successfully"),
    ))
}

/// POST /api/v1/users/refresh-token - Exchange a refresh token for a new pair
///
/// The `refreshToken` cookie wins over a token in the JSON body.
pub async fn refresh_access_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> Result<(CookieJar, ApiResponse<TokenPair>), ApiError> {
    let presented = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| body.and_then(|Json(req)| req.refresh_token));

    let tokens = state.user_service.refresh(presented.as_deref()).await?;

    let jar = with_session_cookies(
        jar,
        &tokens.access_token,
        &tokens.refresh_token,
        state.secure_cookies,
    );

    Ok((
        jar,
        ApiResponse::new(StatusCode::OK, tokens, "Access token refreshed"),
    ))
}

/// POST /api/v1/users/logout - Revoke the session and clear cookies
pub async fn logout_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    state.user_service.logout(user.user_id).await?;

    let jar = jar
        .remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"));

    Ok((
        jar,
        ApiResponse::new(StatusCode::OK, json!({}), "User logged out"),
    ))
}

fn with_session_cookies(jar: CookieJar, access: &str, refresh: &str, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_TOKEN_COOKIE, access, secure))
        .add(session_cookie(REFRESH_TOKEN_COOKIE, refresh, secure))
}

fn session_cookie(name: &'static str, value: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value.to_string()))
        .http_only(true)
        .secure(secure)
        .path("/")
        .build()
}
