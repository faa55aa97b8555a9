//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CreateUser, NewUser, User, UserClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate user by login and return a JWT token
    pub async fn authenticate(&self, login: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_login(login)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid login or password".to_string()))?;

        if !verify_password(&user, password)? {
            return Err(AppError::Authentication("Invalid login or password".to_string()));
        }

        let token = self.issue_token(&user)?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok((token, user))
    }

    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        UserClaims::for_user(user, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Create a new user
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()?;

        let login = user.login.trim().to_string();
        if self.repository.users.get_by_login(&login).await?.is_some() {
            return Err(AppError::Conflict("Login already exists".to_string()));
        }

        let created = self
            .repository
            .users
            .create(&NewUser {
                login,
                password_hash: hash_password(&user.password)?,
                first_name: user.first_name,
                last_name: user.last_name,
                email: user.email,
                is_librarian: user.is_librarian,
            })
            .await?;
        tracing::info!(user_id = created.id, is_librarian = created.is_librarian, "User created");
        Ok(created)
    }

    /// Create the configured librarian account when no user exists yet
    pub async fn ensure_bootstrap_librarian(&self) -> AppResult<Option<User>> {
        let (Some(login), Some(password)) = (
            self.config.bootstrap_login.as_deref(),
            self.config.bootstrap_password.as_deref(),
        ) else {
            return Ok(None);
        };

        if self.repository.users.count().await? > 0 {
            return Ok(None);
        }

        let user = self
            .create_user(CreateUser {
                login: login.to_string(),
                password: password.to_string(),
                first_name: None,
                last_name: None,
                email: None,
                is_librarian: true,
            })
            .await?;
        tracing::warn!(login = %user.login, "Bootstrap librarian account created");
        Ok(Some(user))
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::mock::Mocks;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_hours: 1,
            bootstrap_login: Some("admin".to_string()),
            bootstrap_password: Some("correct horse".to_string()),
        }
    }

    fn stored(password: &str, is_librarian: bool) -> User {
        User {
            id: 3,
            login: "mhill".to_string(),
            password: hash_password(password).unwrap(),
            first_name: None,
            last_name: None,
            email: None,
            is_librarian,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_authenticate_issues_token_with_capabilities() {
        let mut mocks = Mocks::default();
        let user = stored("s3cret-pass", true);
        mocks
            .users
            .expect_get_by_login()
            .returning(move |_| Ok(Some(user.clone())));

        let service = UsersService::new(mocks.into_repository(), config());
        let (token, user) = service.authenticate("mhill", "s3cret-pass").await.unwrap();
        let claims = UserClaims::from_token(&token, "test-secret").unwrap();
        assert_eq!(claims.user_id, user.id);
        assert!(claims.is_librarian());
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let mut mocks = Mocks::default();
        let user = stored("s3cret-pass", false);
        mocks
            .users
            .expect_get_by_login()
            .returning(move |_| Ok(Some(user.clone())));

        let service = UsersService::new(mocks.into_repository(), config());
        let result = service.authenticate("mhill", "guess").await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_duplicate_login() {
        let mut mocks = Mocks::default();
        mocks
            .users
            .expect_get_by_login()
            .returning(|_| Ok(Some(stored("whatever1", false))));
        mocks.users.expect_create().never();

        let service = UsersService::new(mocks.into_repository(), config());
        let result = service
            .create_user(CreateUser {
                login: "mhill".to_string(),
                password: "long enough".to_string(),
                first_name: None,
                last_name: None,
                email: None,
                is_librarian: false,
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_only_when_empty() {
        let mut mocks = Mocks::default();
        mocks.users.expect_count().returning(|| Ok(1));
        mocks.users.expect_create().never();

        let service = UsersService::new(mocks.into_repository(), config());
        assert!(service.ensure_bootstrap_librarian().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_creates_librarian() {
        let mut mocks = Mocks::default();
        mocks.users.expect_count().returning(|| Ok(0));
        mocks.users.expect_get_by_login().returning(|_| Ok(None));
        mocks
            .users
            .expect_create()
            .withf(|new| new.login == "admin" && new.is_librarian && new.password_hash.starts_with("$argon2"))
            .times(1)
            .returning(|new| {
                Ok(User {
                    id: 1,
                    login: new.login.clone(),
                    password: new.password_hash.clone(),
                    first_name: None,
                    last_name: None,
                    email: None,
                    is_librarian: new.is_librarian,
                    created_at: None,
                })
            });

        let service = UsersService::new(mocks.into_repository(), config());
        let created = service.ensure_bootstrap_librarian().await.unwrap().unwrap();
        assert!(created.is_librarian);
    }
}
