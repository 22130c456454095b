use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{dto::session::SessionSnapshot, state::session::Judgment};

/// Orientation gestures reported by phone controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    /// Phone tipped down: the term was found.
    Confirm,
    /// Phone tipped up: the term was passed.
    Skip,
}

impl From<Gesture> for Judgment {
    fn from(gesture: Gesture) -> Self {
        match gesture {
            Gesture::Confirm => Judgment::Correct,
            Gesture::Skip => Judgment::Skip,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from controller WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerInboundMessage {
    /// First message: join the room shown on the presenter screen.
    Join {
        #[serde(rename = "roomCode")]
        room_code: String,
    },
    /// Explicit judgment of the current term.
    Judge {
        judgment: Judgment,
        #[serde(default, rename = "expectedIndex")]
        expected_index: Option<usize>,
    },
    /// Gesture mapped to a judgment.
    Gesture {
        gesture: Gesture,
        #[serde(default, rename = "expectedIndex")]
        expected_index: Option<usize>,
    },
    #[serde(other)]
    Unknown,
}

impl ControllerInboundMessage {
    /// Parse a text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to controller WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerOutboundMessage {
    /// Join accepted.
    Joined {
        #[serde(rename = "roomCode")]
        room_code: String,
    },
    /// Latest session state.
    Snapshot { session: Box<SessionSnapshot> },
    /// A judgment was refused; the session is unchanged.
    Rejected { reason: String },
    /// No live room uses the requested code.
    RoomNotFound {
        #[serde(rename = "roomCode")]
        room_code: String,
    },
    /// The presenter opened a new room; the controller must join again.
    RoomClosed,
}
