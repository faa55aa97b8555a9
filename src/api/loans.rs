//! Loan and copy management endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Redirect,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        book_instance::{
            BookInstance, InstanceDetails, InstanceQuery, LendForm, LoanStatus, NewInstanceForm,
            StatusForm,
        },
        page::ListPage,
        renewal::{RenewalForm, RenewalView},
    },
};

use super::AuthenticatedUser;

const ACTIVE_LOANS: &str = "/api/v1/loans";

/// Copies on loan, soonest due first
#[derive(Serialize, ToSchema)]
pub struct LoanList {
    pub title: String,
    pub empty_message: String,
    pub items: Vec<InstanceDetails>,
}

/// Books borrowed by the current user
#[utoipa::path(
    get,
    path = "/loans/mine",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's loans", body = LoanList),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn my_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LoanList>> {
    let items = state.services.loans.loans_for_user(claims.user_id).await?;
    Ok(Json(LoanList {
        title: "Borrowed books".to_string(),
        empty_message: "You have no books borrowed.".to_string(),
        items,
    }))
}

/// Every active loan
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All active loans", body = LoanList),
        (status = 403, description = "Librarian capability required")
    )
)]
pub async fn all_loans(State(state): State<crate::AppState>) -> AppResult<Json<LoanList>> {
    let items = state.services.loans.all_active_loans().await?;
    Ok(Json(LoanList {
        title: "All borrowed books".to_string(),
        empty_message: "There are no books borrowed.".to_string(),
        items,
    }))
}

/// Inventory of copies, optionally filtered by status
#[utoipa::path(
    get,
    path = "/instances",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("status" = Option<LoanStatus>, Query, description = "Only copies with this status"),
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("per_page" = Option<i64>, Query, description = "Rows per page (at most 100)")
    ),
    responses(
        (status = 200, description = "One page of copies", body = InstancePage),
        (status = 403, description = "Librarian capability required")
    )
)]
pub async fn inventory(
    State(state): State<crate::AppState>,
    Query(query): Query<InstanceQuery>,
) -> AppResult<Json<ListPage<InstanceDetails>>> {
    let page = state.services.loans.inventory(query).await?;
    Ok(Json(page))
}

/// Renewal form for a copy on loan
#[utoipa::path(
    get,
    path = "/instances/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Renewal form", body = RenewalView),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Copy not found"),
        (status = 422, description = "Copy is not on loan")
    )
)]
pub async fn renewal_form(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RenewalView>> {
    let view = state.services.loans.renewal_form(id).await?;
    Ok(Json(view))
}

/// Set a new due date for a copy on loan
#[utoipa::path(
    post,
    path = "/instances/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Copy ID")
    ),
    request_body = RenewalForm,
    responses(
        (status = 303, description = "Renewed; redirects to all active loans"),
        (status = 400, description = "Invalid date, with the proposed default", body = ErrorResponse),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Copy not found"),
        (status = 422, description = "Copy is not on loan")
    )
)]
pub async fn renew(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    form: Result<Json<RenewalForm>, JsonRejection>,
) -> AppResult<Redirect> {
    // An unreadable body carries no date; the renewal check reports it on the field
    let due_back = form.ok().and_then(|Json(form)| form.due_back);
    state.services.loans.renew(id, due_back.as_deref()).await?;
    Ok(Redirect::to(ACTIVE_LOANS))
}

/// Lend an available or reserved copy
#[utoipa::path(
    post,
    path = "/instances/{id}/lend",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Copy ID")
    ),
    request_body = LendForm,
    responses(
        (status = 200, description = "Copy lent", body = BookInstance),
        (status = 400, description = "Unknown borrower or invalid date"),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Copy not found"),
        (status = 422, description = "Copy cannot be lent")
    )
)]
pub async fn lend(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(form): Json<LendForm>,
) -> AppResult<Json<BookInstance>> {
    let instance = state.services.loans.lend(id, form).await?;
    Ok(Json(instance))
}

/// Mark a copy on loan as returned
#[utoipa::path(
    post,
    path = "/instances/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Copy returned", body = BookInstance),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Copy not found"),
        (status = 422, description = "Copy is not on loan")
    )
)]
pub async fn mark_returned(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookInstance>> {
    let instance = state.services.loans.mark_returned(id).await?;
    Ok(Json(instance))
}

/// Change the shelf status of a copy that is not on loan
#[utoipa::path(
    post,
    path = "/instances/{id}/status",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Copy ID")
    ),
    request_body = StatusForm,
    responses(
        (status = 200, description = "Status changed", body = BookInstance),
        (status = 400, description = "On loan is set through lending"),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Copy not found"),
        (status = 422, description = "Copy is on loan")
    )
)]
pub async fn set_status(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(form): Json<StatusForm>,
) -> AppResult<Json<BookInstance>> {
    let instance = state.services.loans.set_status(id, form).await?;
    Ok(Json(instance))
}

/// Add a copy of a book
#[utoipa::path(
    post,
    path = "/books/{id}/instances",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = NewInstanceForm,
    responses(
        (status = 201, description = "Copy created", body = BookInstance),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn create_instance(
    State(state): State<crate::AppState>,
    Path(book_id): Path<i32>,
    Json(form): Json<NewInstanceForm>,
) -> AppResult<(StatusCode, Json<BookInstance>)> {
    let instance = state.services.loans.add_instance(book_id, form).await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

/// Delete a copy that is not on loan
#[utoipa::path(
    delete,
    path = "/instances/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Copy ID")
    ),
    responses(
        (status = 204, description = "Copy deleted"),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Copy not found"),
        (status = 422, description = "Copy is on loan")
    )
)]
pub async fn delete_instance(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.loans.delete_instance(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
