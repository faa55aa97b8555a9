//! Books repository for database operations

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{on_delete, on_write};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookFilter, BookForm, BookListRow, BookSummary},
        genre::{BookGenreRow, Genre},
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BooksRepository: Send + Sync {
    async fn count(&self) -> AppResult<i64>;
    /// Books whose title contains `needle`, ignoring case. An empty needle matches all.
    async fn count_title_contains(&self, needle: &str) -> AppResult<i64>;
    async fn count_by_author(&self, author_id: i32) -> AppResult<i64>;
    /// Books passing `filter`; the title filter follows `count_title_contains`
    async fn count_matching(&self, filter: &BookFilter) -> AppResult<i64>;
    /// Books passing `filter`, in insertion order
    async fn list(
        &self,
        filter: &BookFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<BookSummary>>;
    async fn list_by_author(&self, author_id: i32) -> AppResult<Vec<BookSummary>>;
    async fn get_by_id(&self, id: i32) -> AppResult<Book>;
    async fn genres_of(&self, book_id: i32) -> AppResult<Vec<Genre>>;
    async fn create(&self, form: &BookForm) -> AppResult<Book>;
    async fn update(&self, id: i32, form: &BookForm) -> AppResult<Book>;
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

const BOOK_COLUMNS: &str = "id, title, author_id, summary, isbn, language_id";

const LIST_SELECT: &str = r#"
    SELECT b.id, b.title, b.author_id,
           a.first_name AS author_first_name, a.last_name AS author_last_name
    FROM books b
    LEFT JOIN authors a ON a.id = b.author_id
"#;

/// $1 author id, $2 title substring; NULL disables either
const BOOK_FILTER: &str = r#"
    WHERE ($1::int4 IS NULL OR b.author_id = $1)
      AND ($2::text IS NULL OR POSITION(LOWER($2) IN LOWER(b.title)) > 0)
"#;

const DUPLICATE_ISBN: &str = "A book with this ISBN already exists";

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Attach genre names to list rows with a single query
    async fn summarize(&self, rows: Vec<BookListRow>) -> AppResult<Vec<BookSummary>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let genre_rows = sqlx::query_as::<_, BookGenreRow>(
            r#"
            SELECT bg.book_id, g.id, g.name
            FROM book_genres bg
            JOIN genres g ON g.id = bg.genre_id
            WHERE bg.book_id = ANY($1)
            ORDER BY g.name
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut by_book: HashMap<i32, Vec<Genre>> = HashMap::new();
        for row in genre_rows {
            by_book.entry(row.book_id).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let genres = by_book.remove(&row.id).unwrap_or_default();
                BookSummary::from_row(row, &genres)
            })
            .collect())
    }

    async fn replace_genres(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        book_id: i32,
        genre_ids: &[i32],
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM book_genres WHERE book_id = $1")
            .bind(book_id)
            .execute(&mut **tx)
            .await?;

        if !genre_ids.is_empty() {
            sqlx::query(
                "INSERT INTO book_genres (book_id, genre_id) SELECT $1, UNNEST($2::int4[])",
            )
            .bind(book_id)
            .bind(genre_ids)
            .execute(&mut **tx)
            .await
            .map_err(|e| on_write(e, "Duplicate genre"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl BooksRepository for PgBooksRepository {
    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_title_contains(&self, needle: &str) -> AppResult<i64> {
        // POSITION avoids LIKE wildcards in user input
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM books WHERE POSITION(LOWER($1) IN LOWER(title)) > 0",
        )
        .bind(needle)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_by_author(&self, author_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_matching(&self, filter: &BookFilter) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books b {}", BOOK_FILTER))
                .bind(filter.author_id)
                .bind(&filter.title)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn list(
        &self,
        filter: &BookFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<BookSummary>> {
        let rows = sqlx::query_as::<_, BookListRow>(&format!(
            "{} {} ORDER BY b.id LIMIT $3 OFFSET $4",
            LIST_SELECT, BOOK_FILTER
        ))
        .bind(filter.author_id)
        .bind(&filter.title)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        self.summarize(rows).await
    }

    async fn list_by_author(&self, author_id: i32) -> AppResult<Vec<BookSummary>> {
        let rows = sqlx::query_as::<_, BookListRow>(&format!(
            "{} WHERE b.author_id = $1 ORDER BY b.title, b.id",
            LIST_SELECT
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        self.summarize(rows).await
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn genres_of(&self, book_id: i32) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(
            r#"
            SELECT g.id, g.name
            FROM book_genres bg
            JOIN genres g ON g.id = bg.genre_id
            WHERE bg.book_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    async fn create(&self, form: &BookForm) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (title, author_id, summary, isbn, language_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&form.title)
        .bind(form.author_id)
        .bind(&form.summary)
        .bind(&form.isbn)
        .bind(form.language_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| on_write(e, DUPLICATE_ISBN))?;

        Self::replace_genres(&mut tx, book.id, &form.genre_ids).await?;
        tx.commit().await?;

        Ok(book)
    }

    async fn update(&self, id: i32, form: &BookForm) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET title = $1, author_id = $2, summary = $3, isbn = $4, language_id = $5
            WHERE id = $6
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&form.title)
        .bind(form.author_id)
        .bind(&form.summary)
        .bind(&form.isbn)
        .bind(form.language_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| on_write(e, DUPLICATE_ISBN))?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        Self::replace_genres(&mut tx, book.id, &form.genre_ids).await?;
        tx.commit().await?;

        Ok(book)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| on_delete(e, "Book still has copies"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
