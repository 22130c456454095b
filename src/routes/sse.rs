use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/public",
    tag = "sse",
    responses((status = 200, description = "Public SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream session snapshots to displays and controllers.
pub async fn public_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_public(&state);
    info!("New public SSE connection");
    let initial = sse_service::initial_events(&state, None);
    sse_service::to_sse_stream(receiver, initial, StreamKind::Public)
}

#[utoipa::path(
    get,
    path = "/sse/presenter",
    tag = "sse",
    responses(
        (status = 200, description = "Presenter SSE stream", content_type = "text/event-stream", body = String),
        (status = 401, description = "Another presenter holds the lease")
    )
)]
/// Claim the presenter lease and stream presenter events, starting with the token.
pub async fn presenter_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, token) = sse_service::subscribe_presenter(&state).await?;
    info!("New presenter SSE connection");
    let initial = sse_service::initial_events(&state, Some(&token));
    Ok(sse_service::to_sse_stream(
        receiver,
        initial,
        StreamKind::Presenter { state, token },
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/public", get(public_stream))
        .route("/sse/presenter", get(presenter_stream))
}
