//! Repository layer for database operations

pub mod authors;
pub mod book_instances;
pub mod books;
pub mod genres;
pub mod languages;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::error::AppError;

pub use authors::AuthorsRepository;
pub use book_instances::BookInstancesRepository;
pub use books::BooksRepository;
pub use genres::GenresRepository;
pub use languages::LanguagesRepository;
pub use users::UsersRepository;

/// Main repository struct: one store per aggregate
#[derive(Clone)]
pub struct Repository {
    pub authors: Arc<dyn AuthorsRepository>,
    pub books: Arc<dyn BooksRepository>,
    pub instances: Arc<dyn BookInstancesRepository>,
    pub genres: Arc<dyn GenresRepository>,
    pub languages: Arc<dyn LanguagesRepository>,
    pub users: Arc<dyn UsersRepository>,
}

impl Repository {
    /// Create PostgreSQL-backed stores sharing the given pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            authors: Arc::new(authors::PgAuthorsRepository::new(pool.clone())),
            books: Arc::new(books::PgBooksRepository::new(pool.clone())),
            instances: Arc::new(book_instances::PgBookInstancesRepository::new(pool.clone())),
            genres: Arc::new(genres::PgGenresRepository::new(pool.clone())),
            languages: Arc::new(languages::PgLanguagesRepository::new(pool.clone())),
            users: Arc::new(users::PgUsersRepository::new(pool)),
        }
    }
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn db_code(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

/// Map constraint failures of an INSERT/UPDATE
pub(crate) fn on_write(err: sqlx::Error, duplicate: &str) -> AppError {
    match db_code(&err).as_deref() {
        Some(UNIQUE_VIOLATION) => AppError::Conflict(duplicate.to_string()),
        Some(FOREIGN_KEY_VIOLATION) => {
            AppError::Validation("Referenced record does not exist".to_string())
        }
        _ => AppError::Database(err),
    }
}

/// Map constraint failures of a DELETE
pub(crate) fn on_delete(err: sqlx::Error, referenced: &str) -> AppError {
    match db_code(&err).as_deref() {
        Some(FOREIGN_KEY_VIOLATION) => AppError::Conflict(referenced.to_string()),
        _ => AppError::Database(err),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_constraint_errors_pass_through() {
        assert!(matches!(
            on_write(sqlx::Error::RowNotFound, "dup"),
            AppError::Database(_)
        ));
        assert!(matches!(
            on_delete(sqlx::Error::PoolClosed, "in use"),
            AppError::Database(_)
        ));
    }
}
