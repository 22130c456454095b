use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        session::SessionSnapshot,
        sse::{NoticeEvent, PhaseChangedEvent, ServerEvent, SystemStatus},
    },
    state::{
        SharedState,
        session::{SessionDocument, SessionPhase},
    },
};

/// Event name of full session snapshots.
pub const EVENT_SESSION_SNAPSHOT: &str = "session.snapshot";
const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_PRESENTER_NOTICE: &str = "notice";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Notice kind pushed when the question pool has nothing left to draw.
pub const NOTICE_POOL_EXHAUSTED: &str = "pool_exhausted";
/// Notice kind pushed when a new room replaced the previous one.
pub const NOTICE_ROOM_OPENED: &str = "room_opened";

/// Broadcast the full session to every subscriber.
pub fn broadcast_session_snapshot(state: &SharedState, doc: &SessionDocument) {
    let payload = SessionSnapshot::from(doc);
    send_public_event(state, EVENT_SESSION_SNAPSHOT, &payload);
    send_presenter_event(state, EVENT_SESSION_SNAPSHOT, &payload);
}

/// Broadcast a phase change notification.
pub fn broadcast_phase_changed(state: &SharedState, from: SessionPhase, doc: &SessionDocument) {
    let payload = PhaseChangedEvent {
        from,
        to: doc.phase,
        session: SessionSnapshot::from(doc),
    };
    send_public_event(state, EVENT_PHASE_CHANGED, &payload);
    send_presenter_event(state, EVENT_PHASE_CHANGED, &payload);
}

/// Push a notice that only the presenter should see.
pub fn broadcast_presenter_notice(state: &SharedState, kind: &str, message: impl Into<String>) {
    let payload = NoticeEvent {
        kind: kind.to_string(),
        message: message.into(),
    };
    send_presenter_event(state, EVENT_PRESENTER_NOTICE, &payload);
}

/// Broadcast the degraded flag.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
    send_presenter_event(state, EVENT_SYSTEM_STATUS, &payload);
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

fn send_presenter_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.presenter_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize presenter SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn notices_reach_the_presenter_stream_only() {
        let state = AppState::new(AppConfig::default());
        let mut public = state.public_sse().subscribe();
        let mut presenter = state.presenter_sse().subscribe();

        broadcast_presenter_notice(&state, NOTICE_POOL_EXHAUSTED, "nothing left");

        let event = presenter.try_recv().unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_PRESENTER_NOTICE));
        assert!(event.data.contains(NOTICE_POOL_EXHAUSTED));
        assert!(public.try_recv().is_err());
    }

    #[tokio::test]
    async fn phase_change_carries_both_phases() {
        let state = AppState::new(AppConfig::default());
        let mut public = state.public_sse().subscribe();
        let doc = state.session_document();

        broadcast_phase_changed(&state, SessionPhase::Review, &doc);

        let event = public.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(value["from"], "REVIEW");
        assert_eq!(value["to"], "SETTINGS");
        assert_eq!(value["session"]["roomCode"], doc.room_code.as_str());
    }
}
