//! Due date rules for renewing and lending copies

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::book_instance::BookInstance;
use crate::{config::LoansConfig, error::AppError};

pub const DUE_BACK_FIELD: &str = "due_back";

/// Renewal submission
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RenewalForm {
    /// Proposed due date, YYYY-MM-DD. Missing or null is reported as an invalid date
    #[serde(default)]
    pub due_back: Option<String>,
}

/// Renewal form as presented to the librarian
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RenewalView {
    pub instance: BookInstance,
    pub book_title: String,
    pub proposed_due_back: NaiveDate,
    pub help_text: String,
}

/// Bounds for a due date relative to today
#[derive(Debug, Clone, Copy)]
pub struct RenewalPolicy {
    pub default_weeks: i64,
    pub max_weeks: i64,
}

impl From<&LoansConfig> for RenewalPolicy {
    fn from(config: &LoansConfig) -> Self {
        Self {
            default_weeks: config.default_renewal_weeks,
            max_weeks: config.max_renewal_weeks,
        }
    }
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            default_weeks: 3,
            max_weeks: 4,
        }
    }
}

impl RenewalPolicy {
    /// Date offered when the form is first shown or re-presented
    pub fn proposed(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::weeks(self.default_weeks)
    }

    pub fn latest(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::weeks(self.max_weeks)
    }

    pub fn help_text(&self) -> String {
        format!(
            "Enter a date between now and {} weeks (default {}).",
            self.max_weeks, self.default_weeks
        )
    }

    /// Parse and bound-check a submitted date. Today and the last allowed
    /// day are both accepted.
    pub fn check(&self, raw: &str, today: NaiveDate) -> Result<NaiveDate, AppError> {
        let reject = |message: String| AppError::InvalidField {
            field: DUE_BACK_FIELD,
            message,
            proposed: Some(self.proposed(today).to_string()),
        };

        let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| reject("Enter a valid date.".to_string()))?;

        if date < today {
            return Err(reject("Invalid date - renewal in past".to_string()));
        }
        if date > self.latest(today) {
            return Err(reject(format!(
                "Invalid date - renewal more than {} weeks ahead",
                self.max_weeks
            )));
        }

        Ok(date)
    }
}
