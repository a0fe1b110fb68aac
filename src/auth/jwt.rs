//! JWT token generation and validation
//!
//! Handles creation and verification of access and refresh tokens. The two kinds
//! are signed with separate secrets and carry separate lifetimes, so a token of
//! one kind never verifies as the other.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{TokenPair, User};

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Token type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims shared by both token kinds
///
/// Refresh tokens only carry the subject; the profile fields are present on
/// access tokens alone.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// JWT ID, keeps tokens issued within the same second distinct
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    pub token_type: TokenType,
}

impl Claims {
    /// Extract user ID from claims
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|e| JwtError::InvalidToken(e.to_string()))
    }
}

#[derive(Clone)]
struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKey {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Signing material for both token kinds
#[derive(Clone)]
pub struct TokenKeys {
    access: SigningKey,
    refresh: SigningKey,
}

impl TokenKeys {
    pub fn new(
        access_secret: &str,
        access_ttl: Duration,
        refresh_secret: &str,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access: SigningKey::new(access_secret, access_ttl),
            refresh: SigningKey::new(refresh_secret, refresh_ttl),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.access_token_secret,
            config.access_token_expiry,
            &config.refresh_token_secret,
            config.refresh_token_expiry,
        )
    }

    fn key(&self, token_type: TokenType) -> &SigningKey {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    /// Generate an access token carrying the user's public profile claims
    pub fn issue_access_token(&self, user: &User) -> Result<String, JwtError> {
        self.sign(user.id, Some(user), TokenType::Access)
    }

    /// Generate a refresh token bound only to the user ID
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, JwtError> {
        self.sign(user_id, None, TokenType::Refresh)
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user)?,
            refresh_token: self.issue_refresh_token(user.id)?,
        })
    }

    fn sign(
        &self,
        user_id: Uuid,
        profile: Option<&User>,
        token_type: TokenType,
    ) -> Result<String, JwtError> {
        let key = self.key(token_type);
        let now = Utc::now();
        let exp = now
            .checked_add_signed(key.ttl)
            .ok_or_else(|| JwtError::EncodingFailed("token expiry out of range".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            username: profile.map(|u| u.username.clone()),
            email: profile.map(|u| u.email.clone()),
            full_name: profile.map(|u| u.full_name.clone()),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            token_type,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Verify and decode a token of the expected kind
    ///
    /// # Returns
    /// * `Ok(Claims)` if token is valid
    /// * `Err(JwtError::TokenExpired)` if the signature is valid but `exp` has passed
    /// * `Err(JwtError::InvalidToken)` for anything else, including the wrong kind
    pub fn verify(&self, token: &str, token_type: TokenType) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.key(token_type).decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::InvalidToken(e.to_string()),
            })?;

        if token_data.claims.token_type != token_type {
            return Err(JwtError::InvalidToken(format!(
                "expected {} token",
                token_type.as_str()
            )));
        }

        Ok(token_data.claims)
    }
}
