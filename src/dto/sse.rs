use serde::Serialize;
use utoipa::ToSchema;

use crate::{dto::session::SessionSnapshot, state::session::SessionPhase};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from pre-rendered data.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event of the presenter stream, carrying the lease token for REST calls.
pub struct PresenterHandshake {
    /// Value to send in the `X-Presenter-Token` header.
    pub token: String,
    /// Seconds the lease lives without renewal.
    pub lease_ttl_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the session moves to another phase.
pub struct PhaseChangedEvent {
    pub from: SessionPhase,
    pub to: SessionPhase,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
/// Presenter-only notice, e.g. an exhausted question pool.
pub struct NoticeEvent {
    /// Machine-readable kind (`pool_exhausted`, `lease_lost`, ...).
    pub kind: String,
    /// Human-readable explanation.
    pub message: String,
}
