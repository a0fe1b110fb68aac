//! Login, refresh-token rotation and logout

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use uuid::Uuid;

    use profilevault_server::config::MIN_BCRYPT_COST;
    use profilevault_server::auth::{
        JwtError, PasswordHasher, SessionManager, TokenKeys, TokenType,
    };
    use profilevault_server::error::ApiError;
    use profilevault_server::models::{LoginRequest, RegisterUserRequest, UserResponse};
    use profilevault_server::storage::{InMemoryObjectStore, Staging, UploadCoordinator};
    use profilevault_server::users::{
        InMemoryUserRepository, RegistrationUploads, UserRepository, UserService,
    };

    struct Harness {
        service: UserService,
        repo: InMemoryUserRepository,
        keys: Arc<TokenKeys>,
    }

    fn harness_with_keys(keys: TokenKeys) -> Harness {
        let repo = InMemoryUserRepository::new();
        let users: Arc<dyn UserRepository> = Arc::new(repo.clone());
        let keys = Arc::new(keys);

        let service = UserService::new(
            users.clone(),
            SessionManager::new(users, keys.clone()),
            UploadCoordinator::new(Arc::new(InMemoryObjectStore::new())),
            PasswordHasher::new(MIN_BCRYPT_COST),
        );

        Harness {
            service,
            repo,
            keys,
        }
    }

    fn harness() -> Harness {
        harness_with_keys(TokenKeys::new(
            "access-secret",
            Duration::minutes(15),
            "refresh-secret",
            Duration::days(10),
        ))
    }

    async fn register_ada(harness: &Harness) -> UserResponse {
        let staging = Staging::new(
            std::env::temp_dir().join(format!("profilevault-session-{}", Uuid::new_v4().simple())),
        );
        staging.ensure_dir().await.unwrap();
        let avatar = staging.stage_bytes("ada.png", b"png").await.unwrap();

        harness
            .service
            .register(
                RegisterUserRequest {
                    full_name: "Ada Lovelace".to_string(),
                    username: "ada".to_string(),
                    email: "ada@x.com".to_string(),
                    password: "s3cret".to_string(),
                },
                RegistrationUploads {
                    avatar: Some(avatar),
                    cover_image: None,
                },
            )
            .await
            .unwrap()
    }

    fn login_request(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: Some(username.to_string()),
            email: None,
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_issues_tokens_and_stores_refresh_token() {
        let harness = harness();
        let user = register_ada(&harness).await;

        let login = harness
            .service
            .login(login_request("ada", "s3cret"))
            .await
            .unwrap();

        let claims = harness
            .keys
            .verify(&login.access_token, TokenType::Access)
            .unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.username.as_deref(), Some("ada"));

        let stored = harness.repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(login.refresh_token.as_str()));
        assert_eq!(login.user, user);
    }

    #[tokio::test]
    async fn test_login_by_email_is_case_insensitive() {
        let harness = harness();
        register_ada(&harness).await;

        let request = LoginRequest {
            username: None,
            email: Some("ADA@X.com".to_string()),
            password: "s3cret".to_string(),
        };

        assert!(harness.service.login(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_password_names_neither_factor() {
        let harness = harness();
        register_ada(&harness).await;

        let err = harness
            .service
            .login(login_request("ada", "wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized(_)));
        let message = err.to_string().to_lowercase();
        assert!(!message.contains("password"));
        assert!(!message.contains("username"));
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let harness = harness();

        let err = harness
            .service
            .login(login_request("nobody", "s3cret"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_login_requires_an_identifier() {
        let harness = harness();

        let request = LoginRequest {
            username: Some("  ".to_string()),
            email: None,
            password: "s3cret".to_string(),
        };

        assert!(matches!(
            harness.service.login(request).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_previous_token() {
        let harness = harness();
        let user = register_ada(&harness).await;
        let login = harness
            .service
            .login(login_request("ada", "s3cret"))
            .await
            .unwrap();

        let rotated = harness
            .service
            .refresh(Some(&login.refresh_token))
            .await
            .unwrap();
        assert_ne!(rotated.refresh_token, login.refresh_token);

        let stored = harness.repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(rotated.refresh_token.as_str()));

        // the superseded token is still well-formed and unexpired, but no longer current
        let err = harness
            .service
            .refresh(Some(&login.refresh_token))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        // and the rejection did not disturb the live session
        assert!(harness
            .service
            .refresh(Some(&rotated.refresh_token))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_second_login_supersedes_first_session() {
        let harness = harness();
        register_ada(&harness).await;

        let first = harness
            .service
            .login(login_request("ada", "s3cret"))
            .await
            .unwrap();
        let _second = harness
            .service
            .login(login_request("ada", "s3cret"))
            .await
            .unwrap();

        assert!(matches!(
            harness.service.refresh(Some(&first.refresh_token)).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_access_token_is_not_a_refresh_token() {
        let harness = harness();
        register_ada(&harness).await;
        let login = harness
            .service
            .login(login_request("ada", "s3cret"))
            .await
            .unwrap();

        assert!(matches!(
            harness.service.refresh(Some(&login.access_token)).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_access_token_is_rejected_the_same_way_twice() {
        let harness = harness_with_keys(TokenKeys::new(
            "access-secret",
            Duration::seconds(-60),
            "refresh-secret",
            Duration::days(10),
        ));
        let user = register_ada(&harness).await;
        let login = harness
            .service
            .login(login_request("ada", "s3cret"))
            .await
            .unwrap();
        let before = harness.repo.find_by_id(user.id).await.unwrap().unwrap();

        for _ in 0..2 {
            assert!(matches!(
                harness.keys.verify(&login.access_token, TokenType::Access),
                Err(JwtError::TokenExpired)
            ));
        }

        let after = harness.repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(before.refresh_token, after.refresh_token);
    }

    #[tokio::test]
    async fn test_expired_refresh_token_is_rejected() {
        let harness = harness_with_keys(TokenKeys::new(
            "access-secret",
            Duration::minutes(15),
            "refresh-secret",
            Duration::seconds(-60),
        ));
        register_ada(&harness).await;
        let login = harness
            .service
            .login(login_request("ada", "s3cret"))
            .await
            .unwrap();

        let err = harness
            .service
            .refresh(Some(&login.refresh_token))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired refresh token");
    }

    #[tokio::test]
    async fn test_refresh_token_for_deleted_account() {
        let harness = harness();
        let orphan = harness.keys.issue_refresh_token(Uuid::new_v4()).unwrap();

        assert!(matches!(
            harness.service.refresh(Some(&orphan)).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let harness = harness();
        let user = register_ada(&harness).await;
        let login = harness
            .service
            .login(login_request("ada", "s3cret"))
            .await
            .unwrap();

        harness.service.logout(user.id).await.unwrap();

        let stored = harness.repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.refresh_token.is_none());
        assert!(matches!(
            harness.service.refresh(Some(&login.refresh_token)).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_have_one_winner() {
        let harness = harness();
        register_ada(&harness).await;
        let login = harness
            .service
            .login(login_request("ada", "s3cret"))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            harness.service.refresh(Some(&login.refresh_token)),
            harness.service.refresh(Some(&login.refresh_token)),
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }
}
