//! API handlers for the catalog REST endpoints

pub mod auth;
pub mod authors;
pub mod books;
pub mod guards;
pub mod health;
pub mod index;
pub mod loans;
pub mod openapi;
pub mod taxonomy;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tower_sessions::{cookie::time::Duration, Expiry, MemoryStore, SessionManagerLayer};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

/// Decode the `Authorization: Bearer` header
pub fn bearer_claims(headers: &HeaderMap, secret: &str) -> Result<UserClaims, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

    UserClaims::from_token(token, secret).map_err(|e| AppError::Authentication(e.to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Already decoded by a guard
        if let Some(claims) = parts.extensions.get::<UserClaims>() {
            return Ok(AuthenticatedUser(claims.clone()));
        }

        let claims = bearer_claims(&parts.headers, &state.config.auth.jwt_secret)?;
        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.session.secure_cookie)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(
            state.config.session.inactivity_minutes,
        )));

    // Catalog pages, open to anonymous callers unless configured otherwise
    let catalog = Router::new()
        .route("/home", get(index::home))
        .route("/books", get(books::list_books))
        .route("/books/:id", get(books::get_book))
        .route("/authors", get(authors::list_authors))
        .route("/authors/:id", get(authors::get_author))
        .route("/genres", get(taxonomy::list_genres))
        .route("/languages", get(taxonomy::list_languages))
        .route_layer(from_fn_with_state(state.clone(), guards::catalog_access));

    // Librarian-only routes
    let staff = Router::new()
        .route("/loans", get(loans::all_loans))
        .route("/instances", get(loans::inventory))
        .route(
            "/instances/:id/renew",
            get(loans::renewal_form).post(loans::renew),
        )
        .route("/instances/:id/lend", post(loans::lend))
        .route("/instances/:id/return", post(loans::mark_returned))
        .route("/instances/:id/status", post(loans::set_status))
        .route("/instances/:id", delete(loans::delete_instance))
        .route("/books/:id/instances", post(loans::create_instance))
        .route("/authors/create", post(authors::create_author))
        .route("/authors/:id/update", post(authors::update_author))
        .route("/authors/:id/delete", post(authors::delete_author))
        .route("/books/create", post(books::create_book))
        .route("/books/:id/update", post(books::update_book))
        .route("/books/:id/delete", post(books::delete_book))
        .route("/genres", post(taxonomy::create_genre))
        .route("/languages", post(taxonomy::create_language))
        .route("/users", post(users::create_user))
        .route_layer(from_fn_with_state(state.clone(), guards::require_librarian));

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/loans/mine", get(loans::my_loans))
        .merge(catalog)
        .merge(staff)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(sessions)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests;
