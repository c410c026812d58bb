//! Real-time wire types shared by the gateway, call signaling, and API crates.
//!
//! Every frame on a client connection is a JSON object tagged by `type`, with
//! the body under `payload`:
//!
//! ```json
//! {"type": "typing", "room": "conversation:42", "payload": {"conversation_id": "42", "user_id": "…", "is_typing": true}}
//! ```
//!
//! Inbound frames carry no `room`; the hub stamps it on the way out.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const USER_PREFIX: &str = "user:";
const CONVERSATION_PREFIX: &str = "conversation:";

/// A named fan-out group.
///
/// Either a per-user mailbox (`user:<id>`) or a per-conversation channel
/// (`conversation:<id>`). Clients may also join opaque room names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn user(user_id: Uuid) -> Self {
        Self(format!("{USER_PREFIX}{user_id}"))
    }

    pub fn conversation(conversation_id: &str) -> Self {
        Self(format!("{CONVERSATION_PREFIX}{conversation_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// If this is a per-user mailbox, whose is it?
    pub fn mailbox_owner(&self) -> Option<Uuid> {
        self.0.strip_prefix(USER_PREFIX)?.parse().ok()
    }

    pub fn is_mailbox(&self) -> bool {
        self.0.starts_with(USER_PREFIX)
    }
}

impl From<String> for RoomId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typing indicator. Clients send `conversation_id` + `is_typing`; the server
/// fills in `user_id` from the authenticated sender before fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub is_typing: bool,
}

/// Read receipt. `reader_id` is filled in by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadPayload {
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reader_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingCall {
    pub call_id: Uuid,
    pub caller_id: Uuid,
    /// `null` when the caller's profile could not be looked up.
    #[serde(default)]
    pub caller_name: Option<String>,
    #[serde(default)]
    pub caller_avatar: Option<String>,
    pub call_type: String,
    pub channel_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRef {
    pub call_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnded {
    pub call_id: Uuid,
    /// Seconds between answer and hang-up; zero if never answered.
    pub duration: i64,
}

/// Every event a client can send or receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Event {
    // === Client → Server ===
    /// Application-level heartbeat.
    Ping,
    /// Subscribe this connection to a room.
    Join(String),

    // === Server → Client ===
    Pong,
    UserOnline(PresencePayload),
    UserOffline(PresencePayload),
    /// Chat message, opaque to the hub.
    Message(serde_json::Value),
    IncomingCall(IncomingCall),
    CallAnswered(CallRef),
    CallRejected(CallRef),
    CallEnded(CallEnded),

    // === Bidirectional ===
    Typing(TypingPayload),
    Read(ReadPayload),
}

impl Event {
    /// The wire discriminator, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Join(_) => "join",
            Self::Pong => "pong",
            Self::UserOnline(_) => "user_online",
            Self::UserOffline(_) => "user_offline",
            Self::Message(_) => "message",
            Self::IncomingCall(_) => "incoming_call",
            Self::CallAnswered(_) => "call_answered",
            Self::CallRejected(_) => "call_rejected",
            Self::CallEnded(_) => "call_ended",
            Self::Typing(_) => "typing",
            Self::Read(_) => "read",
        }
    }
}

/// The unit of fan-out: an event plus the room it was addressed to.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// `None` for global broadcasts (presence).
    pub room: Option<RoomId>,
    pub event: Event,
}

impl Envelope {
    pub fn to_room(room: RoomId, event: Event) -> Self {
        Self {
            room: Some(room),
            event,
        }
    }

    pub fn broadcast(event: Event) -> Self {
        Self { room: None, event }
    }

    /// Serialize to the JSON text frame sent to clients.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(&self.event)?;
        if let (Some(room), Some(fields)) = (&self.room, value.as_object_mut()) {
            fields.insert("room".into(), serde_json::Value::String(room.to_string()));
        }
        serde_json::to_string(&value)
    }
}
