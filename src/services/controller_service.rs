//! Judgments submitted by controllers.

use std::sync::Arc;

use tracing::info;

use crate::{
    dao::session_store::COUNTER_JUDGMENTS_RECORDED,
    error::ServiceError,
    state::{
        SharedState,
        session::{Judgment, SessionDocument},
        state_machine::SessionCommand,
        transitions::{record_counter, run_command_with_broadcast},
    },
};

/// Whether `room_code` names the live room.
pub fn room_exists(state: &SharedState, room_code: &str) -> bool {
    state.session_document().room_code == room_code
}

/// Record a judgment of the current term in room `room_code`.
///
/// Unknown rooms yield [`ServiceError::NotFound`] without touching the session;
/// paused rounds and stale `expected_index` values are rejected as invalid state.
pub async fn judge(
    state: &SharedState,
    room_code: &str,
    judgment: Judgment,
    expected_index: Option<usize>,
) -> Result<Arc<SessionDocument>, ServiceError> {
    let doc = run_command_with_broadcast(
        state,
        SessionCommand::Judge {
            room_code: room_code.to_string(),
            judgment,
            expected_index,
        },
    )
    .await?;
    info!(
        room_code,
        judgment = ?judgment,
        index = doc.current_index,
        score = doc.score,
        "judgment recorded"
    );
    record_counter(state, COUNTER_JUDGMENTS_RECORDED).await;
    Ok(doc)
}
