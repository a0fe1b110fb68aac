//! User lifecycle service
//!
//! Registration, login, token refresh and logout. Each workflow runs its steps
//! strictly in order and stops at the first failure. Registration uploads media
//! before the record exists, so any failure after the first upload compensates
//! by deleting what was uploaded.

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use super::repository::{RepositoryError, UserRepository};
use crate::auth::{JwtError, PasswordHasher, SessionError, SessionManager, TokenType};
use crate::error::ApiError;
use crate::models::{
    LoginRequest, LoginResponse, NewUser, RegisterUserRequest, TokenPair, User, UserResponse,
};
use crate::storage::{MediaKind, StagedFile, UploadCoordinator};

const CREATION_FAILED: &str = "User creation failed and uploaded media were deleted";
const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token";

/// Attachments submitted with a registration form, already staged on disk
#[derive(Debug, Default)]
pub struct RegistrationUploads {
    pub avatar: Option<StagedFile>,
    pub cover_image: Option<StagedFile>,
}

impl RegistrationUploads {
    /// Remove any staged copy that is still on disk
    pub async fn discard(&self) {
        for staged in [&self.avatar, &self.cover_image].into_iter().flatten() {
            staged.discard().await;
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: SessionManager,
    uploads: UploadCoordinator,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: SessionManager,
        uploads: UploadCoordinator,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            sessions,
            uploads,
            hasher,
        }
    }

    /// Register a new user. Staged attachments are removed on every path.
    pub async fn register(
        &self,
        request: RegisterUserRequest,
        attachments: RegistrationUploads,
    ) -> Result<UserResponse, ApiError> {
        let result = self.register_inner(request, &attachments).await;
        attachments.discard().await;
        result
    }

    async fn register_inner(
        &self,
        request: RegisterUserRequest,
        attachments: &RegistrationUploads,
    ) -> Result<UserResponse, ApiError> {
        // 1. Validate
        request.validate()?;
        let avatar_file = attachments
            .avatar
            .as_ref()
            .ok_or_else(|| ApiError::Validation("Avatar file is required".to_string()))?;

        let username = request.username.trim().to_lowercase();
        let email = request.email.trim().to_lowercase();

        // 2. Uniqueness
        let existing = self
            .users
            .find_by_username_or_email(Some(&username), Some(&email))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Uniqueness check failed");
                ApiError::Internal("User registration failed".to_string())
            })?;

        if existing.is_some() {
            return Err(ApiError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        // 3. Required media
        let mut pending = self.uploads.begin();
        let avatar = self
            .uploads
            .upload(avatar_file, MediaKind::Avatar)
            .await
            .map_err(|_| ApiError::Upload("Failed to upload avatar".to_string()))?;
        pending.record(avatar.clone());

        // 4. Optional media
        let cover_image = match &attachments.cover_image {
            Some(file) => match self.uploads.upload(file, MediaKind::CoverImage).await {
                Ok(object) => {
                    pending.record(object.clone());
                    Some(object)
                }
                Err(_) => {
                    pending.compensate().await;
                    return Err(ApiError::Upload("Failed to upload cover image".to_string()));
                }
            },
            None => None,
        };

        // 5. Persist
        let new_user = NewUser {
            username,
            email,
            full_name: request.full_name.trim().to_string(),
            avatar: avatar.url,
            cover_image: cover_image.map(|object| object.url).unwrap_or_default(),
            password_hash: String::new(),
        };

        let user = match self.persist(new_user, &request.password).await {
            Ok(user) => user,
            Err(reason) => {
                tracing::error!(error = %reason, "User creation failed");
                pending.compensate().await;
                return Err(ApiError::Persistence(CREATION_FAILED.to_string()));
            }
        };

        // 6. Commit
        let committed = pending.commit();
        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            media = committed.len(),
            "User registered"
        );

        Ok(user.into())
    }

    async fn persist(
        &self,
        mut new_user: NewUser,
        password: &str,
    ) -> Result<User, PersistError> {
        new_user.password_hash = self.hasher.hash(password).await.map_err(PersistError::Hash)?;
        self.users.create(new_user).await.map_err(PersistError::Repository)
    }

    /// Authenticate with username or email plus password and open a session
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ApiError> {
        request.validate()?;

        let username = normalized(request.username.as_deref());
        let email = normalized(request.email.as_deref());

        let user = self
            .users
            .find_by_username_or_email(username.as_deref(), email.as_deref())
            .await
            .map_err(|e| internal("Login failed", e))?
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;

        if !self.hasher.verify(&request.password, &user.password_hash).await {
            tracing::debug!(user_id = %user.id, "Password mismatch");
            return Err(ApiError::Unauthorized("Invalid user credentials".to_string()));
        }

        let tokens = self
            .sessions
            .rotate_refresh_token(user.id)
            .await
            .map_err(|e| internal("Login failed", e))?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            user: user.into(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    /// Exchange a refresh token for a new pair, superseding the presented one
    pub async fn refresh(&self, presented: Option<&str>) -> Result<TokenPair, ApiError> {
        // 1. Extract
        let presented = presented
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Refresh token is required".to_string()))?;

        // 2. Signature and expiry
        let claims = self
            .sessions
            .keys()
            .verify(presented, TokenType::Refresh)
            .map_err(|e| {
                match &e {
                    JwtError::TokenExpired => tracing::debug!("Refresh token expired"),
                    _ => tracing::debug!(error = %e, "Refresh token invalid"),
                }
                unauthorized_refresh()
            })?;
        let user_id = claims.user_id().map_err(|_| unauthorized_refresh())?;

        // 3. Owner
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| internal("Token refresh failed", e))?
            .ok_or_else(|| {
                tracing::debug!(user_id = %user_id, "Refresh token subject not found");
                unauthorized_refresh()
            })?;

        // 4. Rotation state
        self.sessions.ensure_current(&user, presented).map_err(|e| {
            tracing::warn!(user_id = %user.id, error = %e, "Superseded refresh token presented");
            unauthorized_refresh()
        })?;

        // 5. Rotate
        let tokens = self
            .sessions
            .rotate_presented(&user, presented)
            .await
            .map_err(|e| match e {
                SessionError::RotationConflict => {
                    tracing::warn!(user_id = %user.id, "Concurrent refresh lost the race");
                    unauthorized_refresh()
                }
                other => internal("Token refresh failed", other),
            })?;

        tracing::info!(user_id = %user.id, "Access token refreshed");
        Ok(tokens)
    }

    /// Close the session: the stored refresh token is cleared
    pub async fn logout(&self, user_id: Uuid) -> Result<(), ApiError> {
        self.sessions
            .revoke(user_id)
            .await
            .map_err(|e| internal("Logout failed", e))?;

        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserResponse, ApiError> {
        self.users
            .find_by_id(user_id)
            .await
            .map_err(|e| internal("Failed to load user", e))?
            .map(UserResponse::from)
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
enum PersistError {
    #[error(transparent)]
    Hash(crate::auth::PasswordError),

    #[error(transparent)]
    Repository(RepositoryError),
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

fn unauthorized_refresh() -> ApiError {
    ApiError::Unauthorized(INVALID_REFRESH_TOKEN.to_string())
}

fn internal(message: &str, source: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %source, "{}", message);
    ApiError::Internal(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenKeys;
    use crate::storage::InMemoryObjectStore;
    use crate::users::memory::InMemoryUserRepository;
    use chrono::Duration;

    fn service() -> UserService {
        let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::new());
        let keys = TokenKeys::new("access", Duration::minutes(15), "refresh", Duration::days(10));
        UserService::new(
            users.clone(),
            SessionManager::new(users, Arc::new(keys)),
            UploadCoordinator::new(Arc::new(InMemoryObjectStore::new())),
            PasswordHasher::new(crate::config::MIN_BCRYPT_COST),
        )
    }

    #[tokio::test]
    async fn test_refresh_requires_token() {
        let service = service();

        for presented in [None, Some(""), Some("   ")] {
            let err = service.refresh(presented).await.unwrap_err();
            assert_eq!(err.to_string(), "Refresh token is required");
            assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_refresh_rejects_garbage() {
        let err = service().refresh(Some("not.a.jwt")).await.unwrap_err();
        assert_eq!(err.to_string(), INVALID_REFRESH_TOKEN);
    }

    #[tokio::test]
    async fn test_register_without_avatar_is_rejected() {
        let request = RegisterUserRequest {
            full_name: "Ada Lovelace".to_string(),
            username: "ada".to_string(),
            email: "ada@x.com".to_string(),
            password: "s3cret".to_string(),
        };

        let err = service()
            .register(request, RegistrationUploads::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_current_user_unknown() {
        let err = service().current_user(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_normalized_identifier() {
        assert_eq!(normalized(Some("  Ada ")), Some("ada".to_string()));
        assert_eq!(normalized(Some("   ")), None);
        assert_eq!(normalized(None), None);
    }
}
