//! Home page

use axum::{extract::State, Json};
use serde::Serialize;
use tower_sessions::Session;
use utoipa::ToSchema;

use crate::{error::AppResult, services::catalog::CatalogCounts};

const NUM_VISITS: &str = "num_visits";

/// Home page summary
#[derive(Serialize, ToSchema)]
pub struct HomeView {
    #[serde(flatten)]
    pub counts: CatalogCounts,
    /// Visits in the caller's session, this one included
    pub num_visits: i64,
}

/// Catalog counts and the session visit counter
#[utoipa::path(
    get,
    path = "/home",
    tag = "catalog",
    responses(
        (status = 200, description = "Catalog summary", body = HomeView)
    )
)]
pub async fn home(
    State(state): State<crate::AppState>,
    session: Session,
) -> AppResult<Json<HomeView>> {
    let counts = state
        .services
        .catalog
        .counts(&state.config.catalog.highlight_word)
        .await?;

    let num_visits = session.get::<i64>(NUM_VISITS).await?.unwrap_or(0) + 1;
    session.insert(NUM_VISITS, num_visits).await?;

    Ok(Json(HomeView { counts, num_visits }))
}
