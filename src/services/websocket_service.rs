use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        session::SessionSnapshot,
        ws::{ControllerInboundMessage, ControllerOutboundMessage},
    },
    error::ServiceError,
    services::controller_service,
    state::{ControllerConnection, SharedState, session::Judgment},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Writer channel closed; the connection should be terminated.
#[derive(Debug, Error)]
#[error("connection closed")]
struct ConnectionClosed;

/// Handle the full lifecycle for an individual controller WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("controller did not join in time");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let room_code = match ControllerInboundMessage::from_json_str(&initial_message) {
        Ok(ControllerInboundMessage::Join { room_code }) => room_code,
        Ok(_) => {
            warn!("first controller message was not a join");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse controller message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    if !controller_service::room_exists(&state, &room_code) {
        info!(room_code = %room_code, "controller tried to join an unknown room");
        let _ = send_message(
            &outbound_tx,
            &ControllerOutboundMessage::RoomNotFound {
                room_code: room_code.clone(),
            },
        );
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let connection_id = Uuid::new_v4();
    state.controllers().insert(
        connection_id,
        ControllerConnection {
            room_code: room_code.clone(),
            tx: outbound_tx.clone(),
        },
    );
    info!(%connection_id, room_code = %room_code, "controller joined");

    let joined = send_message(
        &outbound_tx,
        &ControllerOutboundMessage::Joined {
            room_code: room_code.clone(),
        },
    )
    .and_then(|()| send_snapshot(&outbound_tx, &state.session_document()));
    if joined.is_err() {
        state.controllers().remove(&connection_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let snapshot_task = spawn_snapshot_forwarder(&state, room_code.clone(), outbound_tx.clone());

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ControllerInboundMessage::from_json_str(&text) {
                Ok(ControllerInboundMessage::Judge {
                    judgment,
                    expected_index,
                }) => {
                    if handle_judgment(&state, &room_code, judgment, expected_index, &outbound_tx)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(ControllerInboundMessage::Gesture {
                    gesture,
                    expected_index,
                }) => {
                    if handle_judgment(
                        &state,
                        &room_code,
                        gesture.into(),
                        expected_index,
                        &outbound_tx,
                    )
                    .await
                    .is_err()
                    {
                        break;
                    }
                }
                Ok(ControllerInboundMessage::Join { .. }) => {
                    warn!(%connection_id, "ignoring duplicate join message");
                }
                Ok(ControllerInboundMessage::Unknown) => {
                    warn!(%connection_id, payload = %text, "ignoring unknown controller message");
                }
                Err(err) => {
                    warn!(%connection_id, error = %err, "failed to parse controller message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%connection_id, "controller closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    snapshot_task.abort();
    state.controllers().remove(&connection_id);
    info!(%connection_id, "controller disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Run one judgment and report refusals back to the controller.
async fn handle_judgment(
    state: &SharedState,
    room_code: &str,
    judgment: Judgment,
    expected_index: Option<usize>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ConnectionClosed> {
    match controller_service::judge(state, room_code, judgment, expected_index).await {
        Ok(_) => Ok(()),
        Err(ServiceError::NotFound(_)) => send_message(
            outbound_tx,
            &ControllerOutboundMessage::RoomNotFound {
                room_code: room_code.to_string(),
            },
        ),
        Err(err) => {
            warn!(room_code, error = %err, "judgment refused");
            send_message(
                outbound_tx,
                &ControllerOutboundMessage::Rejected {
                    reason: err.to_string(),
                },
            )
        }
    }
}

/// Forward every applied snapshot of `room_code` until the room changes.
fn spawn_snapshot_forwarder(
    state: &SharedState,
    room_code: String,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    let mut observer = state.subscribe_session();
    tokio::spawn(async move {
        while let Some(doc) = observer.changed().await {
            if doc.room_code != room_code {
                break;
            }
            if send_snapshot(&tx, &doc).is_err() {
                break;
            }
        }
    })
}

/// Tell every controller of `room_code` that the room is gone and drop them.
pub fn close_room(state: &SharedState, room_code: &str) -> usize {
    let stale: Vec<Uuid> = state
        .controllers()
        .iter()
        .filter(|entry| entry.value().room_code == room_code)
        .map(|entry| *entry.key())
        .collect();

    for id in &stale {
        if let Some((_, connection)) = state.controllers().remove(id) {
            let _ = send_message(&connection.tx, &ControllerOutboundMessage::RoomClosed);
            let _ = connection.tx.send(Message::Close(None));
        }
    }
    stale.len()
}

fn send_snapshot(
    tx: &mpsc::UnboundedSender<Message>,
    doc: &crate::state::session::SessionDocument,
) -> Result<(), ConnectionClosed> {
    send_message(
        tx,
        &ControllerOutboundMessage::Snapshot {
            session: Box::new(SessionSnapshot::from(doc)),
        },
    )
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; a closed writer is reported.
fn send_message<T>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn closing_a_room_notifies_and_drops_its_controllers() {
        let state = AppState::new(AppConfig::default().with_room_code("0420"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (other_tx, mut other_rx) = mpsc::unbounded_channel();
        state.controllers().insert(
            Uuid::new_v4(),
            ControllerConnection {
                room_code: "0420".into(),
                tx,
            },
        );
        state.controllers().insert(
            Uuid::new_v4(),
            ControllerConnection {
                room_code: "1111".into(),
                tx: other_tx,
            },
        );

        assert_eq!(close_room(&state, "0420"), 1);
        assert_eq!(state.controllers().len(), 1);

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        assert!(text.as_str().contains("room_closed"));
        assert!(matches!(rx.recv().await, Some(Message::Close(None))));
        assert!(other_rx.try_recv().is_err());
    }
}
