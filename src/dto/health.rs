use serde::Serialize;
use utoipa::ToSchema;

use crate::state::session::SessionPhase;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Live room code.
    pub room_code: String,
    /// Phase of the live session.
    pub phase: SessionPhase,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(room_code: String, phase: SessionPhase) -> Self {
        Self {
            status: "ok".to_string(),
            room_code,
            phase,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(room_code: String, phase: SessionPhase) -> Self {
        Self {
            status: "degraded".to_string(),
            room_code,
            phase,
        }
    }
}
