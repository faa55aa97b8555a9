//! Genre model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Genre {
    pub id: i32,
    pub name: String,
}

/// Genre attached to a book, as returned by the book_genres join
#[derive(Debug, Clone, FromRow)]
pub struct BookGenreRow {
    pub book_id: i32,
    pub id: i32,
    pub name: String,
}

impl From<BookGenreRow> for Genre {
    fn from(row: BookGenreRow) -> Self {
        Genre {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct GenreForm {
    /// e.g. "Science Fiction"; unique regardless of case
    #[validate(length(min = 1, max = 200, message = "Genre name must be 1-200 characters"))]
    pub name: String,
}

impl GenreForm {
    /// Trimmed name, validated after trimming
    pub fn normalized(mut self) -> AppResult<Self> {
        self.name = self.name.trim().to_string();
        self.validate()?;
        Ok(self)
    }
}
