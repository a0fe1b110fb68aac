//! In-process user repository, used by tests and local tooling

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::{RepositoryError, UserRepository};
use crate::models::{NewUser, User};

#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| username == Some(u.username.as_str()) || email == Some(u.email.as_str()))
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|u| u.username == new_user.username || u.email == new_user.email)
        {
            return Err(RepositoryError::Duplicate);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            full_name: new_user.full_name,
            avatar: new_user.avatar,
            cover_image: new_user.cover_image,
            password_hash: new_user.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn save_refresh_token(
        &self,
        id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<(), RepositoryError> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.refresh_token = refresh_token.map(str::to_owned);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> Result<bool, RepositoryError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if user.refresh_token.as_deref() == Some(current) => {
                user.refresh_token = Some(next.to_owned());
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Test".to_string(),
            avatar: "https://media.example/a.png".to_string(),
            cover_image: String::new(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_uniqueness_enforced() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("ada", "ada@x.com")).await.unwrap();

        assert!(matches!(
            repo.create(new_user("ada", "other@x.com")).await,
            Err(RepositoryError::Duplicate)
        ));
        assert!(matches!(
            repo.create(new_user("other", "ada@x.com")).await,
            Err(RepositoryError::Duplicate)
        ));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_conditional_replace() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(new_user("ada", "ada@x.com")).await.unwrap();

        repo.save_refresh_token(user.id, Some("first")).await.unwrap();
        assert!(!repo.replace_refresh_token(user.id, "stale", "second").await.unwrap());
        assert!(repo.replace_refresh_token(user.id, "first", "second").await.unwrap());

        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_lookup_ignores_absent_identifiers() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("ada", "ada@x.com")).await.unwrap();

        assert!(repo.find_by_username_or_email(None, None).await.unwrap().is_none());
        assert!(repo
            .find_by_username_or_email(None, Some("ada@x.com"))
            .await
            .unwrap()
            .is_some());
    }
}
