//! Service helpers that expose read-only public projections of the live session.

use crate::{
    config::AppConfig,
    dto::{
        public::{CategoriesResponse, CounterSummary, RoomStatusResponse, StatsResponse},
        session::SessionSnapshot,
    },
    error::ServiceError,
    state::SharedState,
};

/// Return the latest session snapshot.
pub fn get_session(state: &SharedState) -> SessionSnapshot {
    SessionSnapshot::from(state.session_document().as_ref())
}

/// Resolve a room code typed on a controller.
pub fn get_room(state: &SharedState, room_code: &str) -> Result<RoomStatusResponse, ServiceError> {
    let doc = state.session_document();
    if doc.room_code != room_code {
        return Err(ServiceError::NotFound(format!("room `{room_code}` not found")));
    }
    Ok(RoomStatusResponse {
        room_code: doc.room_code.clone(),
        state: doc.phase,
    })
}

/// Return the configured subject and categories.
pub fn get_categories(config: &AppConfig) -> CategoriesResponse {
    CategoriesResponse {
        subject: config.subject().to_string(),
        categories: config.categories().to_vec(),
    }
}

/// Return the usage counters.
pub async fn get_stats(state: &SharedState) -> Result<StatsResponse, ServiceError> {
    let store = state.require_session_store().await?;
    let counters = store
        .read_counters()
        .await?
        .into_iter()
        .map(|counter| CounterSummary {
            name: counter.name,
            value: counter.value,
        })
        .collect();
    Ok(StatsResponse { counters })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn unknown_room_is_not_found() {
        let state = AppState::new(AppConfig::default().with_room_code("0420"));
        assert!(get_room(&state, "0420").is_ok());
        assert!(matches!(
            get_room(&state, "9999"),
            Err(ServiceError::NotFound(_))
        ));
    }
}
