//! User persistence
//!
//! The service layer only sees [`UserRepository`]; uniqueness of username and
//! email is enforced here, not by callers.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewUser, User};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("User with this username or email already exists")]
    Duplicate,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Duplicate,
            _ => RepositoryError::Database(e.to_string()),
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// Match on either identifier; `None` never matches
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, RepositoryError>;

    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError>;

    /// Overwrite only the refresh token column, leaving every other field untouched
    async fn save_refresh_token(
        &self,
        id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Replace the refresh token only if the stored value still equals `current`.
    /// Returns `false` when another writer got there first.
    async fn replace_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, RepositoryError>;
}

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, password_hash, refresh_token, created_at, updated_at";

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgUserRepository {
    db_pool: PgPool,
}

impl PgUserRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $2 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, full_name, avatar, cover_image, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(&new_user.avatar)
        .bind(&new_user.cover_image)
        .bind(&new_user.password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(user)
    }

    async fn save_refresh_token(
        &self,
        id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(refresh_token)
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, RepositoryError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $1, updated_at = NOW()
            WHERE id = $2 AND refresh_token = $3
            "#,
        )
        .bind(next)
        .bind(id)
        .bind(current)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }
}
