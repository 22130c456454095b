use std::{
    convert::Infallible,
    time::{Duration, Instant},
};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::{
        session::SessionSnapshot,
        sse::{PresenterHandshake, ServerEvent},
    },
    error::ServiceError,
    services::sse_events::EVENT_SESSION_SNAPSHOT,
    state::SharedState,
};

const EVENT_PRESENTER_TOKEN: &str = "presenter_token";

/// Subscribe to the shared public SSE stream.
pub fn subscribe_public(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.public_sse().subscribe()
}

/// Claim the presenter lease and subscribe to the presenter-only SSE stream.
pub async fn subscribe_presenter(
    state: &SharedState,
) -> Result<(broadcast::Receiver<ServerEvent>, String), ServiceError> {
    let token = claim_presenter_lease(state).await?;
    let receiver = state.presenter_sse().subscribe();
    Ok((receiver, token))
}

/// Identifies the target SSE stream so we can perform stream-specific
/// bookkeeping while the connection is open and when it is torn down.
#[derive(Clone)]
pub enum StreamKind {
    Public,
    /// Keeps the lease alive while the stream is open and releases it afterwards.
    Presenter { state: SharedState, token: String },
}

/// Events sent to a freshly connected client before any broadcast.
pub fn initial_events(state: &SharedState, token: Option<&str>) -> Vec<ServerEvent> {
    let mut events = Vec::with_capacity(2);
    if let Some(token) = token {
        let handshake = PresenterHandshake {
            token: token.to_string(),
            lease_ttl_secs: state.config().presenter_lease_ttl().as_secs(),
        };
        match ServerEvent::json(Some(EVENT_PRESENTER_TOKEN.to_string()), &handshake) {
            Ok(event) => events.push(event),
            Err(err) => warn!(error = %err, "failed to serialize presenter handshake"),
        }
    }
    let snapshot = SessionSnapshot::from(state.session_document().as_ref());
    match ServerEvent::json(Some(EVENT_SESSION_SNAPSHOT.to_string()), &snapshot) {
        Ok(event) => events.push(event),
        Err(err) => warn!(error = %err, "failed to serialize initial snapshot"),
    }
    events
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    initial: Vec<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    let renew_every = match &kind {
        StreamKind::Presenter { state, .. } => state.config().presenter_lease_ttl() / 3,
        StreamKind::Public => Duration::from_secs(60),
    }
    .max(Duration::from_millis(100));

    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                finish(kind).await;
                return;
            }
        }

        let mut renew = interval(renew_every);
        renew.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = renew.tick() => {
                    if let StreamKind::Presenter { state, token } = &kind
                        && !renew_presenter_lease(state, token).await
                    {
                        warn!("presenter lease lost; closing presenter stream");
                        break;
                    }
                }
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // The next snapshot supersedes whatever was skipped.
                            warn!(skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        finish(kind).await;
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

async fn finish(kind: StreamKind) {
    match kind {
        StreamKind::Public => info!("public SSE stream disconnected"),
        StreamKind::Presenter { state, token } => {
            release_presenter_lease(&state, &token).await;
            info!("presenter SSE stream disconnected");
        }
    }
}

/// Reserve the presenter lease, taking over a lapsed one and failing while
/// another presenter holds a live lease.
async fn claim_presenter_lease(state: &SharedState) -> Result<String, ServiceError> {
    let ttl = state.config().presenter_lease_ttl();
    let mut guard = state.presenter_lease().lock().await;
    guard
        .claim(Instant::now(), ttl)
        .map_err(|err| ServiceError::Unauthorized(err.to_string()))
}

/// Extend the lease held by `token`; `false` once it has been lost.
async fn renew_presenter_lease(state: &SharedState, token: &str) -> bool {
    let ttl = state.config().presenter_lease_ttl();
    let mut guard = state.presenter_lease().lock().await;
    guard.renew(token, Instant::now(), ttl).is_ok()
}

/// Check a token presented on a REST call.
pub async fn verify_presenter_token(state: &SharedState, token: &str) -> Result<(), ServiceError> {
    let guard = state.presenter_lease().lock().await;
    guard
        .verify(token, Instant::now())
        .map_err(|err| ServiceError::Unauthorized(err.to_string()))
}

/// Drop the lease so the next presenter connection can claim it.
async fn release_presenter_lease(state: &SharedState, token: &str) {
    let mut guard = state.presenter_lease().lock().await;
    guard.release(token);
}
