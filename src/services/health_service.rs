use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the live room and whether storage is reachable.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_session_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let doc = state.session_document();
    if state.is_degraded() {
        HealthResponse::degraded(doc.room_code.clone(), doc.phase)
    } else {
        HealthResponse::ok(doc.room_code.clone(), doc.phase)
    }
}
