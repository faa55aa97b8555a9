//! Language a book is written in

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Language {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LanguageForm {
    /// Natural language name, e.g. "English", "Farsi"
    #[validate(length(min = 1, max = 200, message = "Language name must be 1-200 characters"))]
    pub name: String,
}

impl LanguageForm {
    /// Trimmed name, validated after trimming
    pub fn normalized(mut self) -> AppResult<Self> {
        self.name = self.name.trim().to_string();
        self.validate()?;
        Ok(self)
    }
}
