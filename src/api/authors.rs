//! Author endpoints

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        author::{Author, AuthorDetails, AuthorForm},
        page::{ListPage, PageQuery},
    },
};

const AUTHOR_LIST: &str = "/api/v1/authors";

/// List authors
#[utoipa::path(
    get,
    path = "/authors",
    tag = "authors",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("per_page" = Option<i64>, Query, description = "Rows per page (at most 100)")
    ),
    responses(
        (status = 200, description = "One page of authors", body = AuthorPage),
        (status = 404, description = "Page past the end")
    )
)]
pub async fn list_authors(
    State(state): State<crate::AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ListPage<Author>>> {
    let page = state.services.authors.list_authors(query).await?;
    Ok(Json(page))
}

/// Get author details with their books
#[utoipa::path(
    get,
    path = "/authors/{id}",
    tag = "authors",
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    responses(
        (status = 200, description = "Author details", body = AuthorDetails),
        (status = 404, description = "Author not found")
    )
)]
pub async fn get_author(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<AuthorDetails>> {
    let author = state.services.authors.get_author(id).await?;
    Ok(Json(author))
}

/// Create an author
#[utoipa::path(
    post,
    path = "/authors/create",
    tag = "authors",
    security(("bearer_auth" = [])),
    request_body = AuthorForm,
    responses(
        (status = 303, description = "Created; redirects to the author list"),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Librarian capability required")
    )
)]
pub async fn create_author(
    State(state): State<crate::AppState>,
    Json(form): Json<AuthorForm>,
) -> AppResult<Redirect> {
    state.services.authors.create_author(form).await?;
    Ok(Redirect::to(AUTHOR_LIST))
}

/// Update an author
#[utoipa::path(
    post,
    path = "/authors/{id}/update",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    request_body = AuthorForm,
    responses(
        (status = 303, description = "Updated; redirects to the author list"),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Author not found")
    )
)]
pub async fn update_author(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(form): Json<AuthorForm>,
) -> AppResult<Redirect> {
    state.services.authors.update_author(id, form).await?;
    Ok(Redirect::to(AUTHOR_LIST))
}

/// Delete an author no book refers to
#[utoipa::path(
    post,
    path = "/authors/{id}/delete",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Author ID")
    ),
    responses(
        (status = 303, description = "Deleted; redirects to the author list"),
        (status = 403, description = "Librarian capability required"),
        (status = 404, description = "Author not found"),
        (status = 409, description = "Author is referenced by books")
    )
)]
pub async fn delete_author(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Redirect> {
    state.services.authors.delete_author(id).await?;
    Ok(Redirect::to(AUTHOR_LIST))
}
