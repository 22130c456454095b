//! Countdown of the running round.
//!
//! A single task ticks while the session is playing, unpaused and a presenter
//! holds a live lease; at zero it moves the round to review.

use std::time::Instant;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::{
    error::ServiceError,
    state::{
        SharedState,
        session::SessionPhase,
        state_machine::SessionCommand,
        transitions::run_command_with_broadcast,
    },
};

/// What a single timer step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do: not playing, paused, or no presenter.
    Idle,
    /// One second was taken off the countdown.
    Ticked(u32),
    /// The countdown reached zero and the round moved to review.
    Expired,
}

/// Drive the countdown forever at the configured tick interval.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; a round must wait a full period.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match tick_once(&state).await {
            Ok(TickOutcome::Expired) => info!("countdown finished; round moved to review"),
            Ok(TickOutcome::Ticked(left)) => debug!(time_left = left, "countdown tick"),
            Ok(TickOutcome::Idle) => {}
            Err(err) => warn!(error = %err, "countdown step failed"),
        }
    }
}

/// Evaluate the countdown guard once and advance it if it holds.
pub async fn tick_once(state: &SharedState) -> Result<TickOutcome, ServiceError> {
    let doc = state.session_document();
    if doc.phase != SessionPhase::Playing || doc.is_paused {
        return Ok(TickOutcome::Idle);
    }
    if !presenter_present(state).await {
        return Ok(TickOutcome::Idle);
    }

    if doc.time_left == 0 {
        run_command_with_broadcast(state, SessionCommand::Expire).await?;
        return Ok(TickOutcome::Expired);
    }

    let next = run_command_with_broadcast(state, SessionCommand::Tick).await?;
    if next.time_left == 0 && next.phase == SessionPhase::Playing {
        run_command_with_broadcast(state, SessionCommand::Expire).await?;
        return Ok(TickOutcome::Expired);
    }
    Ok(TickOutcome::Ticked(next.time_left))
}

/// Renew the live presenter lease; `false` when nobody holds one.
async fn presenter_present(state: &SharedState) -> bool {
    let ttl = state.config().presenter_lease_ttl();
    let mut lease = state.presenter_lease().lock().await;
    lease.renew_active(Instant::now(), ttl)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::QuestionEntity,
            session_store::{SessionStore, memory::MemorySessionStore},
        },
        services::presenter_service,
        state::{AppState, session::RoundConfig},
    };

    async fn playing(time_per_round: u32) -> SharedState {
        let state = AppState::new(AppConfig::default().with_room_code("0420"));
        let store = MemorySessionStore::new();
        store
            .replace_catalog(vec![QuestionEntity {
                id: "1".into(),
                term: "鄭成功".into(),
                book: "台灣史".into(),
                chapter_category: String::new(),
                keywords: String::new(),
            }])
            .await
            .unwrap();
        state.set_session_store(Arc::new(store)).await;
        presenter_service::bootstrap_session(&state).await.unwrap();
        presenter_service::save_config(
            &state,
            RoundConfig {
                total_rounds: 1,
                time_per_round,
                allow_duplicate: false,
            },
        )
        .await
        .unwrap();
        presenter_service::start_round(&state).await.unwrap();
        state
    }

    async fn claim_lease(state: &SharedState) {
        let ttl = state.config().presenter_lease_ttl();
        state
            .presenter_lease()
            .lock()
            .await
            .claim(Instant::now(), ttl)
            .unwrap();
    }

    #[tokio::test]
    async fn no_presenter_means_no_countdown() {
        let state = playing(3).await;
        assert_eq!(tick_once(&state).await.unwrap(), TickOutcome::Idle);
        assert_eq!(state.session_document().time_left, 3);
    }

    #[tokio::test]
    async fn pause_freezes_the_countdown() {
        let state = playing(3).await;
        claim_lease(&state).await;
        presenter_service::set_paused(&state, true).await.unwrap();
        assert_eq!(tick_once(&state).await.unwrap(), TickOutcome::Idle);
        presenter_service::set_paused(&state, false).await.unwrap();
        assert_eq!(tick_once(&state).await.unwrap(), TickOutcome::Ticked(2));
    }

    #[tokio::test]
    async fn countdown_reaching_zero_moves_to_review() {
        let state = playing(2).await;
        claim_lease(&state).await;
        assert_eq!(tick_once(&state).await.unwrap(), TickOutcome::Ticked(1));
        assert_eq!(tick_once(&state).await.unwrap(), TickOutcome::Expired);
        let doc = state.session_document();
        assert_eq!(doc.phase, SessionPhase::Review);
        assert_eq!(doc.time_left, 0);
        assert_eq!(tick_once(&state).await.unwrap(), TickOutcome::Idle);
    }
}
