//! Book endpoints

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        book::{BookDetails, BookForm, BookQuery, BookSummary},
        page::ListPage,
    },
};

const BOOK_LIST: &str = "/api/v1/books";

/// List books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(
        ("author_id" = Option<i32>, Query, description = "Only books by this author"),
        ("title" = Option<String>, Query, description = "Title substring, ignoring case"),
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("per_page" = Option<i64>, Query, description = "Rows per page (at most 100)")
    ),
    responses(
        (status = 200, description = "One page of books", body = BookPage),
        (status = 404, description = "Page past the end")
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<ListPage<BookSummary>>> {
    let page = state.services.catalog.list_books(query).await?;
    Ok(Json(page))
}

/// Get book details with genres and copies
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<BookDetails>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books/create",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookForm,
    responses(
        (status = 303, description = "Created; redirects to the book list"),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Librarian capability required"),
        (status = 409, description = "ISBN already used")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    Json(form): Json<BookForm>,
) -> AppResult<Redirect> {
    state.services.catalog.create_book(form).await?;
    Ok(Redirect::to(BOOK_LIST))
}

/// Update a book
#[utoipa::path(
    post,
    path = "/books/{id}/update",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = BookForm,
    responses(
        (status = 303, description = "Updated; redirects to the book list"),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(form): Json<BookForm>,
) -> AppResult<Redirect> {
    state.services.catalog.update_book(id, form).await?;
    Ok(Redirect::to(BOOK_LIST))
}

/// Delete a book that has no copies
#[utoipa::path(
    post,
    path = "/books/{id}/delete",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 303, description = "Deleted; redirects to the book list"),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book still has copies")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Redirect> {
    state.services.catalog.delete_book(id).await?;
    Ok(Redirect::to(BOOK_LIST))
}
