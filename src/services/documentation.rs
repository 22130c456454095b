use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Party Quiz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::presenter_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::controller::judge,
        crate::routes::public::get_session,
        crate::routes::public::get_room,
        crate::routes::public::get_catalog,
        crate::routes::public::get_categories,
        crate::routes::public::get_stats,
        crate::routes::presenter::open_room,
        crate::routes::presenter::select_category,
        crate::routes::presenter::save_config,
        crate::routes::presenter::start_round,
        crate::routes::presenter::pause_round,
        crate::routes::presenter::resume_round,
        crate::routes::presenter::toggle_judgment,
        crate::routes::presenter::confirm_round,
        crate::routes::presenter::continue_round,
        crate::routes::presenter::reset_session,
        crate::routes::presenter::force_reset_session,
        crate::routes::presenter::list_catalog,
        crate::routes::presenter::import_catalog,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::SessionSnapshot,
            crate::dto::session::QuestionSummary,
            crate::dto::session::HistoryEntrySummary,
            crate::dto::session::RoundScoreSummary,
            crate::dto::session::RoundConfigPayload,
            crate::dto::session::SelectCategoryRequest,
            crate::dto::session::ToggleJudgmentRequest,
            crate::dto::session::JudgeRequest,
            crate::dto::session::RoomResponse,
            crate::dto::catalog::QuestionInput,
            crate::dto::catalog::CatalogImportRequest,
            crate::dto::catalog::CatalogImportResponse,
            crate::dto::catalog::CatalogResponse,
            crate::dto::public::CategoriesResponse,
            crate::dto::public::RoomStatusResponse,
            crate::dto::public::CounterSummary,
            crate::dto::public::StatsResponse,
            crate::dto::ws::Gesture,
            crate::dto::ws::ControllerInboundMessage,
            crate::dto::ws::ControllerOutboundMessage,
            crate::dto::sse::PresenterHandshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::sse::NoticeEvent,
            crate::state::session::SessionPhase,
            crate::state::session::Judgment,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "public", description = "Read-only views of the live session"),
        (name = "presenter", description = "Presenter commands; require the token from /sse/presenter"),
        (name = "controllers", description = "Judgments from phone controllers"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_presenter_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/presenter/room",
            "/presenter/config",
            "/presenter/round/start",
            "/presenter/review/toggle",
            "/presenter/catalog",
            "/rooms/{code}/judge",
            "/sse/presenter",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
