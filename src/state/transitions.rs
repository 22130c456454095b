use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    dao::{
        models::{SessionEntity, SessionPatchEntity},
        session_store::SessionStore,
    },
    error::ServiceError,
    services::sse_events::{broadcast_phase_changed, broadcast_session_snapshot},
    state::{Plan, SharedState, session::SessionDocument, state_machine::SessionCommand},
};

/// Persist a planned transition: merge the patch, or overwrite the document on resets.
pub async fn persist_plan(store: &dyn SessionStore, plan: &Plan) -> Result<(), ServiceError> {
    if plan.overwrite {
        store
            .overwrite_session(SessionEntity::from(&plan.next))
            .await?;
    } else {
        store
            .merge_session(
                plan.next.room_code.clone(),
                SessionPatchEntity::new(&plan.patch, plan.version_next, plan.next.updated_at),
            )
            .await?;
    }
    Ok(())
}

/// Run a command through the state machine with persistence, then broadcast the result.
pub async fn run_command_with_broadcast(
    state: &SharedState,
    command: SessionCommand,
) -> Result<Arc<SessionDocument>, ServiceError> {
    let store = state.require_session_store().await?;
    let ((), applied) = state
        .run_transition(command, |plan| async move {
            debug!(
                plan_id = %plan.id,
                command = ?plan.command,
                from = ?plan.from,
                to = ?plan.to,
                "persisting session transition"
            );
            persist_plan(store.as_ref(), &plan).await
        })
        .await?;

    if applied.phase_changed() {
        broadcast_phase_changed(state, applied.from, &applied.document);
    }
    broadcast_session_snapshot(state, &applied.document);
    Ok(applied.document)
}

/// Bump a usage counter; failures are logged and never fail the caller.
pub async fn record_counter(state: &SharedState, name: &str) {
    let Some(store) = state.session_store().await else {
        return;
    };
    match store.increment_counter(name.to_string(), 1).await {
        Ok(value) => debug!(counter = name, value, "counter incremented"),
        Err(err) => warn!(counter = name, error = %err, "failed to increment counter"),
    }
}
