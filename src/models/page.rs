//! Pagination of list views

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{author::Author, book::BookSummary, book_instance::InstanceDetails};
use crate::error::{AppError, AppResult};

pub const MAX_PER_PAGE: i64 = 100;

/// `?page=&per_page=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams, ToSchema)]
pub struct PageQuery {
    /// 1-based page number (default 1)
    pub page: Option<i64>,
    /// Rows per page (default from configuration, at most 100)
    pub per_page: Option<i64>,
}

/// Resolved page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub fn resolve(page: Option<i64>, per_page: Option<i64>, default_per_page: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(default_per_page)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    /// Saturates for absurd page numbers; `ensure_within` rejects those first
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn num_pages(&self, total: i64) -> i64 {
        ((total + self.per_page - 1) / self.per_page).max(1)
    }

    /// Pages past the end are not found, except an empty first page
    pub fn ensure_within(&self, total: i64) -> AppResult<()> {
        if self.page > self.num_pages(total) {
            return Err(AppError::NotFound(format!("Invalid page ({})", self.page)));
        }
        Ok(())
    }
}

/// One page of a list view
#[derive(Debug, Clone, Serialize, ToSchema)]
#[aliases(
    BookPage = ListPage<BookSummary>,
    AuthorPage = ListPage<Author>,
    InstancePage = ListPage<InstanceDetails>
)]
pub struct ListPage<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub title: String,
    /// Shown instead of the list when it is empty
    pub empty_message: String,
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub num_pages: i64,
}

impl<T> ListPage<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(
        title: &str,
        empty_message: &str,
        items: Vec<T>,
        total: i64,
        request: PageRequest,
    ) -> Self {
        let num_pages = request.num_pages(total);
        Self {
            title: title.to_string(),
            empty_message: empty_message.to_string(),
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            num_pages,
        }
    }
}
