//! Wire protocol for the WebSocket coordinator.
//!
//! Both directions carry JSON text frames shaped as
//! `{"event": "<name>", "data": {...}}`. Inbound frames are decoded into
//! [`ClientFrame`] and routed by event name; outbound frames are the
//! [`ServerEvent`] enum, serialized with adjacent tagging so the envelope
//! shape falls out of serde.
//!
//! Timestamps are RFC 3339 UTC and are stamped server-side at dispatch time.

use crate::auth::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identifier of a live photo session (the broadcast room).
pub type RoomId = String;

/// Identifier of an authenticated user principal.
pub type IdentityId = String;

/// An inbound client frame before payload decoding.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    /// Event name used for dispatch (e.g., "join_session").
    pub event: String,
    /// Event payload; handlers decode this into their own payload type.
    #[serde(default)]
    pub data: Value,
}

// ============================================================================
// Inbound payloads (C→S)
// ============================================================================

/// Payload of `join_session`.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinSession {
    pub session_id: RoomId,
    #[serde(default)]
    pub access_code: Option<String>,
}

/// Payload of `leave_session`.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveSession {
    pub session_id: RoomId,
}

/// Payload of `send_message`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessage {
    pub session_id: RoomId,
    pub body: String,
    #[serde(default)]
    pub kind: MessageKind,
}

/// Payload of `upload_progress`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadProgress {
    pub session_id: RoomId,
    pub filename: String,
    pub progress: f32,
    pub status: String,
}

/// Chat message kind. Unrecognized kinds collapse to `Other` rather than
/// failing the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    #[serde(other)]
    Other,
}

/// An immutable chat message record, as broadcast and as kept in the
/// ephemeral per-room log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub user_id: IdentityId,
    pub display_name: String,
    pub session_id: RoomId,
    pub body: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a new message authored by `author`, stamped now.
    pub fn new(session_id: &str, author: &Identity, body: String, kind: MessageKind) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            user_id: author.id.clone(),
            display_name: author.display_name.clone(),
            session_id: session_id.to_string(),
            body,
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// A photo record pushed by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub session_id: RoomId,
    pub filename: String,
    pub url: String,
    pub uploaded_by: IdentityId,
}

// ============================================================================
// Outbound events (S→C)
// ============================================================================

/// An outbound server event. Serializes as `{"event": ..., "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once after successful authentication.
    Connected {
        user_id: IdentityId,
        timestamp: DateTime<Utc>,
    },
    /// Join success ack to the joining connection.
    SessionJoined {
        session_id: RoomId,
        timestamp: DateTime<Utc>,
    },
    /// Membership change notice, broadcast to the other room members.
    UserJoined {
        user_id: IdentityId,
        display_name: String,
        timestamp: DateTime<Utc>,
    },
    /// Departure notice, broadcast to the remaining room members.
    UserLeft {
        user_id: IdentityId,
        display_name: String,
        timestamp: DateTime<Utc>,
    },
    /// Leave ack to the leaving connection.
    SessionLeft {
        session_id: RoomId,
        timestamp: DateTime<Utc>,
    },
    /// Upload progress rebroadcast to the room.
    PhotoUploadProgress {
        session_id: RoomId,
        user_id: IdentityId,
        filename: String,
        progress: f32,
        status: String,
        timestamp: DateTime<Utc>,
    },
    /// Chat message broadcast to the room.
    NewMessage(ChatMessage),
    /// A photo finished processing (pushed by the ingestion pipeline).
    NewPhoto {
        photo: Photo,
        timestamp: DateTime<Utc>,
    },
    /// A photo's processing status changed.
    PhotoStatusUpdated {
        photo_id: String,
        session_id: RoomId,
        status: String,
        timestamp: DateTime<Utc>,
    },
    /// The session itself changed status (e.g., ended).
    SessionStatusUpdated {
        session_id: RoomId,
        status: String,
        timestamp: DateTime<Utc>,
    },
    /// Per-identity notification, independent of room membership.
    Notification {
        notification: Value,
        timestamp: DateTime<Utc>,
    },
    /// Liveness reply.
    Pong { timestamp: DateTime<Utc> },
    /// Failure signaling; the connection remains open.
    Error {
        #[serde(rename = "type")]
        kind: String,
        message: String,
    },
    /// Precedes a server-initiated forced termination.
    ForceDisconnect {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerEvent {
    /// Post-authentication ack.
    pub fn connected(user_id: &str) -> Self {
        Self::Connected {
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Join ack.
    pub fn session_joined(session_id: &str) -> Self {
        Self::SessionJoined {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Leave ack.
    pub fn session_left(session_id: &str) -> Self {
        Self::SessionLeft {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Membership join notice for `identity`.
    pub fn user_joined(identity: &Identity) -> Self {
        Self::UserJoined {
            user_id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Departure notice for `identity`.
    pub fn user_left(identity: &Identity) -> Self {
        Self::UserLeft {
            user_id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Typed error event.
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Self::Error {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    /// Event name as it appears on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::SessionJoined { .. } => "session_joined",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::SessionLeft { .. } => "session_left",
            Self::PhotoUploadProgress { .. } => "photo_upload_progress",
            Self::NewMessage(_) => "new_message",
            Self::NewPhoto { .. } => "new_photo",
            Self::PhotoStatusUpdated { .. } => "photo_status_updated",
            Self::SessionStatusUpdated { .. } => "session_status_updated",
            Self::Notification { .. } => "notification",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
            Self::ForceDisconnect { .. } => "force_disconnect",
        }
    }
}
