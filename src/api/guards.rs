//! Route guards applied with `route_layer`
//!
//! Guards run before the handler's extractors, so a caller lacking the
//! required capability is refused before any entity lookup happens.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::bearer_claims;
use crate::{error::AppError, AppState};

/// Catalog pages: anyone when `catalog.public_access`, otherwise any signed-in user
pub async fn catalog_access(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.config.catalog.public_access {
        let claims = bearer_claims(request.headers(), &state.config.auth.jwt_secret)?;
        request.extensions_mut().insert(claims);
    }
    Ok(next.run(request).await)
}

/// Requires the librarian (mark returned) capability
pub async fn require_librarian(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = bearer_claims(request.headers(), &state.config.auth.jwt_secret)?;
    if let Err(e) = claims.require_librarian() {
        tracing::warn!(
            user_id = claims.user_id,
            path = %request.uri().path(),
            "Librarian route refused"
        );
        return Err(e);
    }
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
