//! Genre and language endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{
        genre::{Genre, GenreForm},
        language::{Language, LanguageForm},
    },
};

/// List genres
#[utoipa::path(
    get,
    path = "/genres",
    tag = "catalog",
    responses(
        (status = 200, description = "All genres by name", body = Vec<Genre>)
    )
)]
pub async fn list_genres(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Genre>>> {
    let genres = state.services.catalog.list_genres().await?;
    Ok(Json(genres))
}

/// Create a genre
#[utoipa::path(
    post,
    path = "/genres",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = GenreForm,
    responses(
        (status = 201, description = "Genre created", body = Genre),
        (status = 400, description = "Invalid name"),
        (status = 403, description = "Librarian capability required"),
        (status = 409, description = "Genre already exists")
    )
)]
pub async fn create_genre(
    State(state): State<crate::AppState>,
    Json(form): Json<GenreForm>,
) -> AppResult<(StatusCode, Json<Genre>)> {
    let genre = state.services.catalog.create_genre(form).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

/// List languages
#[utoipa::path(
    get,
    path = "/languages",
    tag = "catalog",
    responses(
        (status = 200, description = "All languages by name", body = Vec<Language>)
    )
)]
pub async fn list_languages(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<Language>>> {
    let languages = state.services.catalog.list_languages().await?;
    Ok(Json(languages))
}

/// Create a language
#[utoipa::path(
    post,
    path = "/languages",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = LanguageForm,
    responses(
        (status = 201, description = "Language created", body = Language),
        (status = 400, description = "Invalid name"),
        (status = 403, description = "Librarian capability required"),
        (status = 409, description = "Language already exists")
    )
)]
pub async fn create_language(
    State(state): State<crate::AppState>,
    Json(form): Json<LanguageForm>,
) -> AppResult<(StatusCode, Json<Language>)> {
    let language = state.services.catalog.create_language(form).await?;
    Ok((StatusCode::CREATED, Json(language)))
}
