//! Refresh-token sessions stored on the user record
//!
//! A user has at most one valid refresh token: the value stored on the record.
//! Writing a new one supersedes every token issued before it.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use super::jwt::{JwtError, TokenKeys};
use crate::models::{TokenPair, User};
use crate::users::repository::{RepositoryError, UserRepository};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("User not found")]
    UserNotFound,

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Refresh token does not match the stored session")]
    TokenMismatch,

    #[error("Refresh token was superseded by a concurrent rotation")]
    RotationConflict,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserRepository>,
    keys: Arc<TokenKeys>,
}

impl SessionManager {
    pub fn new(users: Arc<dyn UserRepository>, keys: Arc<TokenKeys>) -> Self {
        Self { users, keys }
    }

    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    /// Issue a fresh pair and overwrite the stored refresh token unconditionally
    pub async fn rotate_refresh_token(&self, user_id: Uuid) -> Result<TokenPair, SessionError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(SessionError::UserNotFound)?;

        let tokens = self.keys.issue_pair(&user)?;
        self.users
            .save_refresh_token(user.id, Some(&tokens.refresh_token))
            .await?;

        tracing::debug!(user_id = %user.id, "Refresh token rotated");
        Ok(tokens)
    }

    /// Reject a presented refresh token that is not the one stored on the record,
    /// even if its signature and expiry are valid
    pub fn ensure_current(&self, user: &User, presented: &str) -> Result<(), SessionError> {
        match user.refresh_token.as_deref() {
            Some(stored) if stored.as_bytes() == presented.as_bytes() => Ok(()),
            _ => Err(SessionError::TokenMismatch),
        }
    }

    /// Issue a fresh pair, replacing `presented` only if it is still the stored value
    pub async fn rotate_presented(
        &self,
        user: &User,
        presented: &str,
    ) -> Result<TokenPair, SessionError> {
        let tokens = self.keys.issue_pair(user)?;

        let replaced = self
            .users
            .replace_refresh_token(user.id, presented, &tokens.refresh_token)
            .await?;

        if !replaced {
            return Err(SessionError::RotationConflict);
        }

        tracing::debug!(user_id = %user.id, "Refresh token exchanged");
        Ok(tokens)
    }

    /// Drop the stored refresh token; every outstanding refresh token stops working
    pub async fn revoke(&self, user_id: Uuid) -> Result<(), SessionError> {
        self.users.save_refresh_token(user_id, None).await?;
        tracing::debug!(user_id = %user_id, "Refresh token revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenType;
    use crate::models::NewUser;
    use crate::users::memory::InMemoryUserRepository;
    use chrono::Duration;

    async fn setup() -> (SessionManager, InMemoryUserRepository, User) {
        let repo = InMemoryUserRepository::new();
        let user = repo
            .create(NewUser {
                username: "ada".to_string(),
                email: "ada@x.com".to_string(),
                full_name: "Ada".to_string(),
                avatar: "memory://avatar".to_string(),
                cover_image: String::new(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let keys = TokenKeys::new("a", Duration::minutes(15), "r", Duration::days(10));
        let sessions = SessionManager::new(Arc::new(repo.clone()), Arc::new(keys));
        (sessions, repo, user)
    }

    #[tokio::test]
    async fn test_rotate_stores_refresh_token() {
        let (sessions, repo, user) = setup().await;

        let tokens = sessions.rotate_refresh_token(user.id).await.unwrap();
        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();

        assert_eq!(stored.refresh_token.as_deref(), Some(tokens.refresh_token.as_str()));
        let claims = sessions
            .keys()
            .verify(&tokens.access_token, TokenType::Access)
            .unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_rotate_unknown_user() {
        let (sessions, _, _) = setup().await;
        assert!(matches!(
            sessions.rotate_refresh_token(Uuid::new_v4()).await,
            Err(SessionError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_superseded_token_is_rejected() {
        let (sessions, repo, user) = setup().await;

        let first = sessions.rotate_refresh_token(user.id).await.unwrap();
        let second = sessions.rotate_refresh_token(user.id).await.unwrap();
        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();

        assert!(matches!(
            sessions.ensure_current(&stored, &first.refresh_token),
            Err(SessionError::TokenMismatch)
        ));
        assert!(sessions.ensure_current(&stored, &second.refresh_token).is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_exchange_has_one_winner() {
        let (sessions, repo, user) = setup().await;

        let issued = sessions.rotate_refresh_token(user.id).await.unwrap();
        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();

        let winner = sessions.rotate_presented(&stored, &issued.refresh_token).await;
        let loser = sessions.rotate_presented(&stored, &issued.refresh_token).await;

        assert!(winner.is_ok());
        assert!(matches!(loser, Err(SessionError::RotationConflict)));
    }

    #[tokio::test]
    async fn test_revoke_clears_session() {
        let (sessions, repo, user) = setup().await;

        let tokens = sessions.rotate_refresh_token(user.id).await.unwrap();
        sessions.revoke(user.id).await.unwrap();
        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();

        assert!(stored.refresh_token.is_none());
        assert!(sessions.ensure_current(&stored, &tokens.refresh_token).is_err());
    }
}
