//! Genres repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::on_write;
use crate::{error::AppResult, models::genre::Genre};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenresRepository: Send + Sync {
    async fn count(&self) -> AppResult<i64>;
    async fn list(&self) -> AppResult<Vec<Genre>>;
    async fn create(&self, name: &str) -> AppResult<Genre>;
}

#[derive(Clone)]
pub struct PgGenresRepository {
    pool: Pool<Postgres>,
}

impl PgGenresRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenresRepository for PgGenresRepository {
    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM genres")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list(&self) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(genres)
    }

    async fn create(&self, name: &str) -> AppResult<Genre> {
        let genre = sqlx::query_as::<_, Genre>(
            "INSERT INTO genres (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_write(e, "Genre already exists (case insensitive match)"))?;
        Ok(genre)
    }
}
