//! Presenter commands driving the session through its phases.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    dao::{
        models::SessionEntity,
        session_store::{COUNTER_ROUNDS_COMPLETED, COUNTER_SESSIONS_CREATED},
    },
    error::ServiceError,
    services::{
        catalog_service,
        sse_events::{
            self, NOTICE_POOL_EXHAUSTED, NOTICE_ROOM_OPENED, broadcast_presenter_notice,
        },
        websocket_service,
    },
    state::{
        SharedState,
        sampler::{self, SamplerError, SamplingPolicy},
        session::{RoundConfig, SessionDocument, generate_room_code},
        state_machine::SessionCommand,
        transitions::{record_counter, run_command_with_broadcast},
    },
};

/// Open a fresh room, closing the current one for every joined controller.
///
/// A pinned room code is reused; otherwise a code different from the current one is drawn.
pub async fn open_room(state: &SharedState) -> Result<Arc<SessionDocument>, ServiceError> {
    let previous = state.session_document().room_code.clone();
    let room_code = match state.config().room_code() {
        Some(pinned) => pinned.to_string(),
        None => generate_room_code(&mut rand::rng(), Some(&previous)),
    };

    let doc = run_command_with_broadcast(
        state,
        SessionCommand::OpenRoom {
            room_code,
            defaults: state.config().defaults(),
        },
    )
    .await?;

    let closed = websocket_service::close_room(state, &previous);
    info!(
        room_code = %doc.room_code,
        previous = %previous,
        closed_controllers = closed,
        "room opened"
    );
    broadcast_presenter_notice(
        state,
        NOTICE_ROOM_OPENED,
        format!("room {} is open", doc.room_code),
    );
    record_counter(state, COUNTER_SESSIONS_CREATED).await;
    Ok(doc)
}

/// Select subject and question-bank category.
pub async fn select_category(
    state: &SharedState,
    subject: Option<String>,
    category: String,
) -> Result<Arc<SessionDocument>, ServiceError> {
    run_command_with_broadcast(state, SessionCommand::SelectCategory { subject, category }).await
}

/// Save round settings and enter the lobby.
pub async fn save_config(
    state: &SharedState,
    config: RoundConfig,
) -> Result<Arc<SessionDocument>, ServiceError> {
    run_command_with_broadcast(state, SessionCommand::SaveConfig(config)).await
}

/// Draw a queue from the catalog and start the next round.
///
/// An exhausted pool leaves the session untouched and pushes a notice to the presenter.
pub async fn start_round(state: &SharedState) -> Result<Arc<SessionDocument>, ServiceError> {
    let catalog = catalog_service::load_catalog(state).await?;
    let doc = state.session_document();

    let policy = SamplingPolicy {
        category: doc.category.as_deref(),
        allow_duplicate: doc.config.allow_duplicate,
        used_ids: &doc.used_ids,
    };
    let queue = match sampler::sample(&catalog, &policy, &mut rand::rng()) {
        Ok(queue) => queue,
        Err(SamplerError::Exhausted { category }) => {
            warn!(category = %category, catalog = catalog.len(), "question pool exhausted");
            broadcast_presenter_notice(
                state,
                NOTICE_POOL_EXHAUSTED,
                format!("no unused question left for `{category}`"),
            );
            return Err(ServiceError::Exhausted(category));
        }
    };

    let drawn = queue.len();
    let doc = run_command_with_broadcast(
        state,
        SessionCommand::StartRound {
            queue,
            basis_revision: Some(doc.revision),
        },
    )
    .await?;
    info!(round = doc.current_round, drawn, "round started");
    Ok(doc)
}

/// Pause or resume the running round.
pub async fn set_paused(
    state: &SharedState,
    paused: bool,
) -> Result<Arc<SessionDocument>, ServiceError> {
    run_command_with_broadcast(state, SessionCommand::SetPaused(paused)).await
}

/// Flip one judgment during review.
pub async fn toggle_judgment(
    state: &SharedState,
    index: usize,
) -> Result<Arc<SessionDocument>, ServiceError> {
    run_command_with_broadcast(state, SessionCommand::ToggleJudgment { index }).await
}

/// Accept the reviewed round.
pub async fn confirm_round(state: &SharedState) -> Result<Arc<SessionDocument>, ServiceError> {
    let doc = run_command_with_broadcast(state, SessionCommand::ConfirmRound).await?;
    info!(
        round = doc.current_round,
        phase = ?doc.phase,
        total = doc.total_score(),
        "round confirmed"
    );
    record_counter(state, COUNTER_ROUNDS_COMPLETED).await;
    Ok(doc)
}

/// Move from the round board back to the lobby for the next round.
pub async fn continue_round(state: &SharedState) -> Result<Arc<SessionDocument>, ServiceError> {
    run_command_with_broadcast(state, SessionCommand::ContinueRound).await
}

/// Restart after the final board, keeping category and settings.
pub async fn reset(state: &SharedState) -> Result<Arc<SessionDocument>, ServiceError> {
    run_command_with_broadcast(state, SessionCommand::Reset).await
}

/// Clear everything from any phase, restoring the configured defaults.
pub async fn force_reset(state: &SharedState) -> Result<Arc<SessionDocument>, ServiceError> {
    run_command_with_broadcast(
        state,
        SessionCommand::ForceReset {
            defaults: state.config().defaults(),
        },
    )
    .await
}

/// Load the persisted session of a pinned room, or persist the fresh one.
///
/// Called once a store is installed.
pub async fn bootstrap_session(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;
    let current = state.session_document();

    if state.config().room_code().is_some()
        && let Some(stored) = store.read_session(current.room_code.clone()).await?
    {
        let doc = SessionDocument::from(stored);
        info!(
            room_code = %doc.room_code,
            phase = ?doc.phase,
            revision = doc.revision,
            "restored persisted session"
        );
        state.restore_session(doc).await;
        sse_events::broadcast_session_snapshot(state, &state.session_document());
        return Ok(());
    }

    store
        .overwrite_session(SessionEntity::from(current.as_ref()))
        .await?;
    info!(room_code = %current.room_code, "session document created");
    record_counter(state, COUNTER_SESSIONS_CREATED).await;
    Ok(())
}

/// Wait for the first storage connection, then bootstrap the session.
pub async fn bootstrap_when_ready(state: SharedState) {
    let mut degraded = state.degraded_watcher();
    if degraded.wait_for(|degraded| !*degraded).await.is_err() {
        return;
    }
    if let Err(err) = bootstrap_session(&state).await {
        warn!(error = %err, "failed to bootstrap session document");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::QuestionEntity,
            session_store::{SessionStore, memory::MemorySessionStore},
        },
        state::{AppState, session::SessionPhase},
    };

    async fn ready_state(questions: usize) -> SharedState {
        let state = AppState::new(AppConfig::default().with_room_code("0420"));
        let store = MemorySessionStore::new();
        store
            .replace_catalog(
                (0..questions)
                    .map(|i| QuestionEntity {
                        id: i.to_string(),
                        term: format!("term-{i}"),
                        book: "台灣史".into(),
                        chapter_category: String::new(),
                        keywords: String::new(),
                    })
                    .collect(),
            )
            .await
            .unwrap();
        state.set_session_store(Arc::new(store)).await;
        bootstrap_session(&state).await.unwrap();
        state
    }

    #[tokio::test]
    async fn exhausted_pool_leaves_the_lobby_untouched() {
        let state = ready_state(0).await;
        save_config(&state, RoundConfig::default()).await.unwrap();
        let mut presenter = state.presenter_sse().subscribe();

        let err = start_round(&state).await.unwrap_err();
        assert!(matches!(err, ServiceError::Exhausted(_)));
        assert_eq!(state.session_document().phase, SessionPhase::Lobby);

        let notice = presenter.try_recv().unwrap();
        assert!(notice.data.contains(NOTICE_POOL_EXHAUSTED));
    }

    #[tokio::test]
    async fn open_room_with_pinned_code_resets_in_place() {
        let state = ready_state(3).await;
        select_category(&state, None, "台灣史".into()).await.unwrap();
        let doc = open_room(&state).await.unwrap();
        assert_eq!(doc.room_code, "0420");
        assert_eq!(doc.phase, SessionPhase::Settings);
        assert_eq!(doc.category, None);
    }

    #[tokio::test]
    async fn bootstrap_restores_pinned_session() {
        let state = ready_state(3).await;
        save_config(&state, RoundConfig::default()).await.unwrap();
        let store = state.session_store().await.unwrap();

        let restarted = AppState::new(AppConfig::default().with_room_code("0420"));
        restarted.set_session_store(store).await;
        bootstrap_session(&restarted).await.unwrap();
        let doc = restarted.session_document();
        assert_eq!(doc.phase, SessionPhase::Lobby);
        assert_eq!(doc.revision, 1);
    }
}
