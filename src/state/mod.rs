pub mod lease;
pub mod ledger;
pub mod sampler;
pub mod session;
mod sse;
pub mod state_machine;
pub mod sync;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{models::SessionEntity, session_store::SessionStore},
    error::ServiceError,
    state::{
        lease::LeaseSlot,
        session::{SessionDocument, SessionPhase, generate_room_code},
        state_machine::{SessionCommand, SessionMachine},
        sync::{SessionFeed, SessionObserver},
    },
};

pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::sse::SseState;

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected controller.
pub struct ControllerConnection {
    /// Room code the controller joined.
    pub room_code: String,
    /// Outbound channel feeding the socket writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Result of an applied transition.
#[derive(Debug, Clone)]
pub struct AppliedTransition {
    /// Phase before the transition.
    pub from: SessionPhase,
    /// Document after the transition.
    pub document: Arc<SessionDocument>,
}

impl AppliedTransition {
    /// Whether the transition moved the session to another phase.
    pub fn phase_changed(&self) -> bool {
        self.from != self.document.phase
    }
}

/// Central application state: the live session, its subscribers and the storage handle.
pub struct AppState {
    config: AppConfig,
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    sse: SseState,
    controllers: DashMap<Uuid, ControllerConnection>,
    session: RwLock<SessionMachine>,
    feed: SessionFeed,
    degraded: watch::Sender<bool>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let room_code = config
            .room_code()
            .map(str::to_owned)
            .unwrap_or_else(|| generate_room_code(&mut rand::rng(), None));
        let document = SessionDocument::new(room_code, config.defaults());
        let (degraded_tx, _rx) = watch::channel(true);
        let transition_timeout = Some(config.transition_timeout());

        Arc::new(Self {
            config,
            session_store: RwLock::new(None),
            sse: SseState::new(64, 64),
            controllers: DashMap::new(),
            session: RwLock::new(SessionMachine::new(document.clone())),
            feed: SessionFeed::new(document),
            degraded: degraded_tx,
            transition_gate: Mutex::new(()),
            transition_timeout,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the session store or fail with [`ServiceError::Degraded`].
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new session store implementation and leave degraded mode.
    pub async fn set_session_store(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current session store and enter degraded mode.
    pub async fn clear_session_store(&self) {
        {
            let mut guard = self.session_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the presenter SSE stream.
    pub fn presenter_sse(&self) -> &SseHub {
        self.sse.presenter().hub()
    }

    /// Lease electing the single presenter that drives the countdown.
    pub fn presenter_lease(&self) -> &Mutex<LeaseSlot> {
        self.sse.presenter().lease()
    }

    /// Registry of joined controller sockets.
    pub fn controllers(&self) -> &DashMap<Uuid, ControllerConnection> {
        &self.controllers
    }

    /// Latest applied session document.
    pub fn session_document(&self) -> Arc<SessionDocument> {
        self.feed.latest()
    }

    /// Observe session snapshots as they are applied.
    pub fn subscribe_session(&self) -> SessionObserver {
        self.feed.subscribe()
    }

    /// Snapshot the state machine bookkeeping.
    pub async fn snapshot(&self) -> Snapshot {
        let sm = self.session.read().await;
        sm.snapshot()
    }

    /// Replace the live session with a document loaded from storage.
    pub async fn restore_session(&self, document: SessionDocument) {
        let _gate = self.transition_gate.lock().await;
        let document = document.normalized();
        self.session.write().await.restore(document.clone());
        self.feed.publish(Arc::new(document));
    }

    async fn plan_transition(&self, command: SessionCommand) -> Result<Plan, PlanError> {
        let mut sm = self.session.write().await;
        sm.plan(command)
    }

    async fn apply_planned_transition(
        &self,
        plan_id: PlanId,
    ) -> Result<SessionDocument, ApplyError> {
        let mut sm = self.session.write().await;
        sm.apply(plan_id)
    }

    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.session.write().await;
        sm.abort(plan_id)
    }

    /// Write the live document back over the stored one.
    ///
    /// A timed-out write may still have landed, leaving the aborted patch in storage.
    async fn resync_store(&self) {
        let Some(store) = self.session_store().await else {
            return;
        };
        let document = self.session_document();
        if let Err(err) = store
            .overwrite_session(SessionEntity::from(document.as_ref()))
            .await
        {
            warn!(
                room_code = %document.room_code,
                error = %err,
                "failed to restore stored session after aborted transition"
            );
        }
    }

    /// Plan `command`, run `work` with the plan, then apply it or abort on failure/timeout.
    ///
    /// Transitions are serialised by a single gate so concurrent commands never interleave.
    pub async fn run_transition<F, Fut, T>(
        &self,
        command: SessionCommand,
        work: F,
    ) -> Result<(T, AppliedTransition), ServiceError>
    where
        F: FnOnce(Plan) -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let kind = command.kind();
        let plan = self.plan_transition(command).await?;
        let plan_id = plan.id;
        let from = plan.from;

        let work_future = work(plan);
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            command = ?kind,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    self.resync_store().await;
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = Arc::new(self.apply_planned_transition(plan_id).await?);
                self.feed.publish(next.clone());
                drop(gate);
                Ok((
                    value,
                    AppliedTransition {
                        from,
                        document: next,
                    },
                ))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        command = ?kind,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::session_store::memory::MemorySessionStore,
        state::{session::RoundConfig, transitions::persist_plan},
    };

    fn save_config() -> SessionCommand {
        SessionCommand::SaveConfig(RoundConfig::default())
    }

    #[tokio::test]
    async fn failed_work_aborts_the_plan() {
        let state = AppState::new(AppConfig::default());
        let err = state
            .run_transition(save_config(), |_| async {
                Err::<(), _>(ServiceError::Degraded)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Settings);
        assert!(snapshot.pending.is_none());
        assert_eq!(state.session_document().revision, 0);
    }

    #[tokio::test]
    async fn applied_transition_is_published() {
        let state = AppState::new(AppConfig::default());
        let mut observer = state.subscribe_session();
        let ((), applied) = state
            .run_transition(save_config(), |plan| async move {
                assert_eq!(plan.to, SessionPhase::Lobby);
                Ok(())
            })
            .await
            .unwrap();
        assert!(applied.phase_changed());
        let seen = observer.changed().await.unwrap();
        assert_eq!(seen.phase, SessionPhase::Lobby);
        assert_eq!(seen.revision, 1);
    }

    #[tokio::test]
    async fn timed_out_write_is_rolled_back_in_storage() {
        let state = AppState::new(
            AppConfig::default()
                .with_room_code("0420")
                .with_transition_timeout(Duration::from_millis(20)),
        );
        let store = Arc::new(MemorySessionStore::new());
        store
            .overwrite_session(SessionEntity::from(state.session_document().as_ref()))
            .await
            .unwrap();
        state.set_session_store(store.clone()).await;

        let writer = store.clone();
        let err = state
            .run_transition(save_config(), |plan| async move {
                persist_plan(writer.as_ref(), &plan).await?;
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));

        let stored = store.read_session("0420".into()).await.unwrap().unwrap();
        assert_eq!(stored.state, SessionPhase::Settings);
        assert_eq!(stored.revision, 0);
        assert_eq!(state.session_document().phase, SessionPhase::Settings);
    }

    #[tokio::test]
    async fn degraded_flag_starts_set() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_session_store().await,
            Err(ServiceError::Degraded)
        ));
        state.update_degraded(false);
        assert!(!state.is_degraded());
    }
}
