//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, authors, books, health, index, loans, taxonomy, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Catalog API",
        version = "0.3.0",
        description = "Local library catalog: books, authors, copies and loans",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::me,
        // Catalog
        index::home,
        taxonomy::list_genres,
        taxonomy::create_genre,
        taxonomy::list_languages,
        taxonomy::create_language,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Loans
        loans::my_loans,
        loans::all_loans,
        loans::inventory,
        loans::renewal_form,
        loans::renew,
        loans::lend,
        loans::mark_returned,
        loans::set_status,
        loans::create_instance,
        loans::delete_instance,
        // Users
        users::create_user,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            // Catalog
            index::HomeView,
            crate::services::catalog::CatalogCounts,
            crate::services::catalog::WordCount,
            crate::models::genre::Genre,
            crate::models::genre::GenreForm,
            crate::models::language::Language,
            crate::models::language::LanguageForm,
            // Books
            crate::models::book::Book,
            crate::models::book::BookSummary,
            crate::models::book::BookDetails,
            crate::models::book::BookForm,
            crate::models::page::BookPage,
            // Authors
            crate::models::author::Author,
            crate::models::author::AuthorDetails,
            crate::models::author::AuthorForm,
            crate::models::page::AuthorPage,
            // Copies & loans
            crate::models::book_instance::LoanStatus,
            crate::models::book_instance::BookInstance,
            crate::models::book_instance::InstanceDetails,
            crate::models::book_instance::NewInstanceForm,
            crate::models::book_instance::LendForm,
            crate::models::book_instance::StatusForm,
            crate::models::renewal::RenewalForm,
            crate::models::renewal::RenewalView,
            crate::models::page::InstancePage,
            loans::LoanList,
            // Users
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::CreateUser,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "catalog", description = "Home page, genres and languages"),
        (name = "books", description = "Books"),
        (name = "authors", description = "Authors"),
        (name = "loans", description = "Copies, loans and renewals"),
        (name = "users", description = "User management")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
