use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        catalog::{CatalogImportRequest, CatalogImportResponse, CatalogResponse},
        session::{
            RoomResponse, RoundConfigPayload, SelectCategoryRequest, SessionSnapshot,
            ToggleJudgmentRequest,
        },
    },
    error::AppError,
    services::{catalog_service, presenter_service, sse_service},
    state::SharedState,
};

const PRESENTER_TOKEN_HEADER: &str = "x-presenter-token";

/// Presenter-only endpoints driving the session through its phases.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/presenter/room", post(open_room))
        .route("/presenter/category", post(select_category))
        .route("/presenter/config", post(save_config))
        .route("/presenter/round/start", post(start_round))
        .route("/presenter/pause", post(pause_round))
        .route("/presenter/resume", post(resume_round))
        .route("/presenter/review/toggle", post(toggle_judgment))
        .route("/presenter/round/confirm", post(confirm_round))
        .route("/presenter/round/continue", post(continue_round))
        .route("/presenter/reset", post(reset_session))
        .route("/presenter/force-reset", post(force_reset_session))
        .route("/presenter/catalog", get(list_catalog).put(import_catalog))
        .route_layer(middleware::from_fn_with_state(state, require_presenter_token))
}

/// Open a fresh room; controllers of the previous room are disconnected.
#[utoipa::path(
    post,
    path = "/presenter/room",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    responses((status = 200, description = "Room opened", body = RoomResponse))
)]
pub async fn open_room(State(state): State<SharedState>) -> Result<Json<RoomResponse>, AppError> {
    let doc = presenter_service::open_room(&state).await?;
    Ok(Json(RoomResponse {
        room_code: doc.room_code.clone(),
        snapshot: SessionSnapshot::from(doc.as_ref()),
    }))
}

/// Pick the subject and the question-bank category.
#[utoipa::path(
    post,
    path = "/presenter/category",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    request_body = SelectCategoryRequest,
    responses(
        (status = 200, description = "Category selected", body = SessionSnapshot),
        (status = 400, description = "Invalid category"),
        (status = 409, description = "Not in the settings phase")
    )
)]
pub async fn select_category(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SelectCategoryRequest>>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc = presenter_service::select_category(&state, payload.subject, payload.category).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}

/// Save round settings and enter the lobby.
#[utoipa::path(
    post,
    path = "/presenter/config",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    request_body = RoundConfigPayload,
    responses(
        (status = 200, description = "Settings saved", body = SessionSnapshot),
        (status = 400, description = "Out-of-range settings"),
        (status = 409, description = "Not in the settings phase")
    )
)]
pub async fn save_config(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RoundConfigPayload>>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc = presenter_service::save_config(&state, payload.into()).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}

/// Draw a question queue and start the next round.
#[utoipa::path(
    post,
    path = "/presenter/round/start",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    responses(
        (status = 200, description = "Round started", body = SessionSnapshot),
        (status = 409, description = "No unused question left in the category")
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc = presenter_service::start_round(&state).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}

/// Freeze the countdown and refuse judgments.
#[utoipa::path(
    post,
    path = "/presenter/pause",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    responses((status = 200, description = "Round paused", body = SessionSnapshot))
)]
pub async fn pause_round(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc = presenter_service::set_paused(&state, true).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}

/// Resume a paused round.
#[utoipa::path(
    post,
    path = "/presenter/resume",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    responses((status = 200, description = "Round resumed", body = SessionSnapshot))
)]
pub async fn resume_round(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc = presenter_service::set_paused(&state, false).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}

/// Flip one judgment while reviewing the round.
#[utoipa::path(
    post,
    path = "/presenter/review/toggle",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    request_body = ToggleJudgmentRequest,
    responses(
        (status = 200, description = "Judgment flipped", body = SessionSnapshot),
        (status = 400, description = "Unknown history index"),
        (status = 409, description = "Not reviewing a round")
    )
)]
pub async fn toggle_judgment(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ToggleJudgmentRequest>>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc = presenter_service::toggle_judgment(&state, payload.index).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}

/// Accept the reviewed round and move to the round or final board.
#[utoipa::path(
    post,
    path = "/presenter/round/confirm",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    responses((status = 200, description = "Round confirmed", body = SessionSnapshot))
)]
pub async fn confirm_round(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc = presenter_service::confirm_round(&state).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}

/// Leave the round board for the lobby.
#[utoipa::path(
    post,
    path = "/presenter/round/continue",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    responses((status = 200, description = "Back in the lobby", body = SessionSnapshot))
)]
pub async fn continue_round(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc = presenter_service::continue_round(&state).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}

/// Restart from the final board, keeping category and settings.
#[utoipa::path(
    post,
    path = "/presenter/reset",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    responses((status = 200, description = "Session restarted", body = SessionSnapshot))
)]
pub async fn reset_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc = presenter_service::reset(&state).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}

/// Clear the session from any phase.
#[utoipa::path(
    post,
    path = "/presenter/force-reset",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    responses((status = 200, description = "Session cleared", body = SessionSnapshot))
)]
pub async fn force_reset_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc = presenter_service::force_reset(&state).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}

/// List every question of the catalog.
#[utoipa::path(
    get,
    path = "/presenter/catalog",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    responses((status = 200, description = "Question catalog", body = CatalogResponse))
)]
pub async fn list_catalog(
    State(state): State<SharedState>,
) -> Result<Json<CatalogResponse>, AppError> {
    Ok(Json(catalog_service::list_catalog(&state).await?))
}

/// Replace the question catalog.
#[utoipa::path(
    put,
    path = "/presenter/catalog",
    tag = "presenter",
    params(("X-Presenter-Token" = String, Header, description = "Token issued by the /sse/presenter stream")),
    request_body = CatalogImportRequest,
    responses(
        (status = 200, description = "Catalog replaced", body = CatalogImportResponse),
        (status = 400, description = "Invalid or duplicated questions")
    )
)]
pub async fn import_catalog(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CatalogImportRequest>>,
) -> Result<Json<CatalogImportResponse>, AppError> {
    Ok(Json(catalog_service::import_catalog(&state, payload).await?))
}

async fn require_presenter_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(PRESENTER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing presenter token header `X-Presenter-Token`".into())
        })?;

    sse_service::verify_presenter_token(&state, &provided).await?;
    Ok(next.run(req).await)
}
