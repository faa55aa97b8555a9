//! Users repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::on_write;
use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, User},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn count(&self) -> AppResult<i64>;
    async fn get_by_id(&self, id: i32) -> AppResult<User>;
    /// Case-insensitive login lookup
    async fn get_by_login(&self, login: &str) -> AppResult<Option<User>>;
    async fn create(&self, user: &NewUser) -> AppResult<User>;
}

#[derive(Clone)]
pub struct PgUsersRepository {
    pool: Pool<Postgres>,
}

impl PgUsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, login, password, first_name, last_name, email, is_librarian, created_at";

#[async_trait]
impl UsersRepository for PgUsersRepository {
    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn get_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(login) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (login, password, first_name, last_name, email, is_librarian)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.is_librarian)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_write(e, "Login already exists"))?;
        Ok(created)
    }
}
