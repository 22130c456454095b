use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::session::{JudgeRequest, SessionSnapshot},
    error::AppError,
    services::controller_service,
    state::SharedState,
};

/// Endpoints for controllers that cannot keep a WebSocket open.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms/{code}/judge", post(judge))
}

#[utoipa::path(
    post,
    path = "/rooms/{code}/judge",
    tag = "controllers",
    params(("code" = String, Path, description = "Room code the controller joined")),
    request_body = JudgeRequest,
    responses(
        (status = 200, description = "Judgment recorded", body = SessionSnapshot),
        (status = 409, description = "Paused, stale or outside a running round"),
        (status = 404, description = "Unknown room")
    )
)]
/// Record a judgment of the current term.
pub async fn judge(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<JudgeRequest>>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let doc =
        controller_service::judge(&state, &code, payload.judgment, payload.expected_index).await?;
    Ok(Json(SessionSnapshot::from(doc.as_ref())))
}
