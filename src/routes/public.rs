use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{
    dto::{
        catalog::CatalogResponse,
        public::{CategoriesResponse, NoQuery, RoomStatusResponse, StatsResponse},
        session::SessionSnapshot,
    },
    error::AppError,
    services::{catalog_service, public_service},
    state::SharedState,
};

/// Public read-only endpoints that expose the current session.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/session", get(get_session))
        .route("/public/rooms/{code}", get(get_room))
        .route("/public/catalog", get(get_catalog))
        .route("/public/categories", get(get_categories))
        .route("/public/stats", get(get_stats))
}

#[utoipa::path(
    get,
    path = "/public/session",
    tag = "public",
    responses((status = 200, description = "Current session", body = SessionSnapshot))
)]
/// Return the latest session snapshot.
pub async fn get_session(
    State(state): State<SharedState>,
    Query(_no_query): Query<NoQuery>,
) -> Json<SessionSnapshot> {
    Json(public_service::get_session(&state))
}

#[utoipa::path(
    get,
    path = "/public/rooms/{code}",
    tag = "public",
    params(("code" = String, Path, description = "Four-digit room code typed on a controller")),
    responses(
        (status = 200, description = "Room is live", body = RoomStatusResponse),
        (status = 404, description = "Unknown room")
    )
)]
/// Resolve a room code before a controller joins it.
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomStatusResponse>, AppError> {
    Ok(Json(public_service::get_room(&state, &code)?))
}

#[utoipa::path(
    get,
    path = "/public/catalog",
    tag = "public",
    responses((status = 200, description = "Question catalog", body = CatalogResponse))
)]
/// Return the whole question catalog.
pub async fn get_catalog(
    State(state): State<SharedState>,
    Query(_no_query): Query<NoQuery>,
) -> Result<Json<CatalogResponse>, AppError> {
    Ok(Json(catalog_service::list_catalog(&state).await?))
}

#[utoipa::path(
    get,
    path = "/public/categories",
    tag = "public",
    responses((status = 200, description = "Selectable categories", body = CategoriesResponse))
)]
/// Return the subject and the categories a presenter can pick.
pub async fn get_categories(
    State(state): State<SharedState>,
    Query(_no_query): Query<NoQuery>,
) -> Json<CategoriesResponse> {
    Json(public_service::get_categories(state.config()))
}

#[utoipa::path(
    get,
    path = "/public/stats",
    tag = "public",
    responses((status = 200, description = "Usage counters", body = StatsResponse))
)]
/// Return the usage counters.
pub async fn get_stats(
    State(state): State<SharedState>,
    Query(_no_query): Query<NoQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    Ok(Json(public_service::get_stats(&state).await?))
}
