//! Author model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::book::BookSummary;
use crate::error::{AppError, AppResult};

/// Author as stored in the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

impl Author {
    /// "Last, First", the form used in listings and on book pages
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

/// Author page: the author and every book referencing them
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthorDetails {
    #[serde(flatten)]
    pub author: Author,
    pub display_name: String,
    pub books: Vec<BookSummary>,
}

/// Fields a librarian may set when creating or editing an author
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AuthorForm {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

impl AuthorForm {
    /// Trim names, then validate field lengths and that death does not precede birth
    pub fn normalized(mut self) -> AppResult<Self> {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.validate()?;
        if let (Some(born), Some(died)) = (self.date_of_birth, self.date_of_death) {
            if died < born {
                return Err(AppError::InvalidField {
                    field: "date_of_death",
                    message: "Date of death precedes date of birth".to_string(),
                    proposed: None,
                });
            }
        }
        Ok(self)
    }
}
