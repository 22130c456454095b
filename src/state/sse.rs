use tokio::sync::{Mutex, broadcast};

use crate::{dto::sse::ServerEvent, state::lease::LeaseSlot};

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
pub struct SseState {
    public: SseHub,
    presenter: PresenterSseState,
}

impl SseState {
    /// Build the SSE sub-tree with per-stream channel capacities.
    pub fn new(public_capacity: usize, presenter_capacity: usize) -> Self {
        Self {
            public: SseHub::new(public_capacity),
            presenter: PresenterSseState::new(presenter_capacity),
        }
    }

    /// Access the public SSE hub used by displays.
    pub fn public(&self) -> &SseHub {
        &self.public
    }

    /// Access the presenter SSE bundle containing both hub and lease.
    pub fn presenter(&self) -> &PresenterSseState {
        &self.presenter
    }
}

/// State bundle holding the presenter SSE hub and the leadership lease.
pub struct PresenterSseState {
    hub: SseHub,
    lease: Mutex<LeaseSlot>,
}

impl PresenterSseState {
    fn new(capacity: usize) -> Self {
        Self {
            hub: SseHub::new(capacity),
            lease: Mutex::new(LeaseSlot::default()),
        }
    }

    /// Borrow the broadcast hub used for presenter-only events.
    pub fn hub(&self) -> &SseHub {
        &self.hub
    }

    /// Borrow the lease slot that elects the single presenter.
    pub fn lease(&self) -> &Mutex<LeaseSlot> {
        &self.lease
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
