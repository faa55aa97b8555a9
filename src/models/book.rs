//! Book model, listing/detail views and the edit form

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{author::Author, book_instance::BookInstance, genre::Genre, language::Language};
use crate::error::{AppError, AppResult};

/// Number of genres shown in the list column
const DISPLAYED_GENRES: usize = 3;

/// Book as stored in the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    /// None once the author record has been detached
    pub author_id: Option<i32>,
    pub summary: String,
    /// Normalised ISBN-10 or ISBN-13 (digits only, ISBN-10 may end in X)
    pub isbn: Option<String>,
    pub language_id: i32,
}

/// Book list row joined with its author's name
#[derive(Debug, Clone, FromRow)]
pub struct BookListRow {
    pub id: i32,
    pub title: String,
    pub author_id: Option<i32>,
    pub author_first_name: Option<String>,
    pub author_last_name: Option<String>,
}

/// Book as shown in lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookSummary {
    pub id: i32,
    pub title: String,
    pub author_id: Option<i32>,
    pub author: Option<String>,
    pub display_genre: String,
}

impl BookSummary {
    pub fn from_row(row: BookListRow, genres: &[Genre]) -> Self {
        let author = match (row.author_last_name, row.author_first_name) {
            (Some(last), Some(first)) => Some(format!("{}, {}", last, first)),
            (Some(last), None) => Some(last),
            _ => None,
        };
        BookSummary {
            id: row.id,
            title: row.title,
            author_id: row.author_id,
            author,
            display_genre: display_genre(genres),
        }
    }
}

/// Full book page with its copies
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetails {
    pub id: i32,
    pub title: String,
    pub summary: String,
    pub isbn: Option<String>,
    pub author: Option<Author>,
    pub language: Option<Language>,
    pub genres: Vec<Genre>,
    pub instances: Vec<BookInstance>,
}

/// Book list query; the filters combine
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Books by this author only
    pub author_id: Option<i32>,
    /// Substring of the title, ignoring case
    pub title: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl BookQuery {
    pub fn filter(&self) -> BookFilter {
        BookFilter {
            author_id: self.author_id,
            title: self.title.clone(),
        }
    }
}

/// Row filter applied to both the book count and the book page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub author_id: Option<i32>,
    pub title: Option<String>,
}

/// Fields a librarian may set when creating or editing a book
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookForm {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub author_id: Option<i32>,
    #[validate(length(max = 1000, message = "Summary must be at most 1000 characters"))]
    #[serde(default)]
    pub summary: String,
    /// ISBN-10 or ISBN-13, hyphens and spaces allowed
    pub isbn: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<i32>,
    pub language_id: i32,
}

impl BookForm {
    /// Validate lengths and replace the ISBN with its normalised form.
    /// A blank ISBN is treated as absent.
    pub fn normalized(mut self) -> AppResult<Self> {
        self.title = self.title.trim().to_string();
        self.validate()?;
        self.isbn = match self.isbn.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(normalize_isbn(raw).map_err(|message| AppError::InvalidField {
                field: "isbn",
                message,
                proposed: None,
            })?),
        };
        self.genre_ids.sort_unstable();
        self.genre_ids.dedup();
        Ok(self)
    }
}

/// First genres of a book, comma separated
pub fn display_genre(genres: &[Genre]) -> String {
    genres
        .iter()
        .take(DISPLAYED_GENRES)
        .map(|g| g.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strip separators and verify the ISBN-10 or ISBN-13 check digit
pub fn normalize_isbn(raw: &str) -> Result<String, String> {
    let isbn: String = raw
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    match isbn.len() {
        10 => {
            let mut sum = 0u32;
            for (i, c) in isbn.chars().enumerate() {
                let digit = match c {
                    'X' if i == 9 => 10,
                    c => c.to_digit(10).ok_or_else(|| format!("'{}' is not an ISBN", raw))?,
                };
                sum += (10 - i as u32) * digit;
            }
            if sum % 11 != 0 {
                return Err(format!("ISBN-10 check digit mismatch in '{}'", raw));
            }
        }
        13 => {
            let mut sum = 0u32;
            for (i, c) in isbn.chars().enumerate() {
                let digit = c.to_digit(10).ok_or_else(|| format!("'{}' is not an ISBN", raw))?;
                sum += if i % 2 == 0 { digit } else { digit * 3 };
            }
            if sum % 10 != 0 {
                return Err(format!("ISBN-13 check digit mismatch in '{}'", raw));
            }
        }
        _ => return Err("ISBN must have 10 or 13 characters".to_string()),
    }

    Ok(isbn)
}
