//! Unified error handling for event handlers.
//!
//! Handler failures are strictly per-connection: they are logged, optionally
//! surfaced to the originating client as a typed `error` event, and never
//! touch any other connection's state.

use crate::events::ServerEvent;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while handling a client event.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The frame's payload did not decode into the handler's payload type.
    #[error("invalid payload: {0}")]
    BadPayload(String),

    /// The connection may not act in the room: access verification denied
    /// the join, or a send/progress frame targeted a session the connection
    /// is not a member of.
    #[error("access denied")]
    AccessDenied,

    /// Unexpected fault while processing a join (e.g., collaborator down).
    #[error("join failed: {0}")]
    JoinFailed(String),

    /// No handler registered for the event name.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The connection's outgoing queue is gone; the connection is tearing
    /// down and no reply is possible.
    #[error("send error: {0}")]
    Send(#[from] mpsc::error::SendError<ServerEvent>),
}

impl HandlerError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadPayload(_) => "invalid_payload",
            Self::AccessDenied => "access_denied",
            Self::JoinFailed(_) => "join_session_failed",
            Self::UnknownEvent(_) => "unknown_event",
            Self::Send(_) => "send_error",
        }
    }

    /// Convert to a wire `error` event.
    ///
    /// Returns `None` for errors that don't warrant a client-visible reply
    /// (the connection is already tearing down).
    pub fn to_error_event(&self) -> Option<ServerEvent> {
        match self {
            Self::Send(_) => None,
            Self::AccessDenied => Some(ServerEvent::error(
                self.error_code(),
                "you do not have access to this session",
            )),
            other => Some(ServerEvent::error(other.error_code(), other.to_string())),
        }
    }
}

/// Result type for event handlers.
pub type HandlerResult = Result<(), HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(HandlerError::AccessDenied.error_code(), "access_denied");
        assert_eq!(
            HandlerError::JoinFailed("db down".into()).error_code(),
            "join_session_failed"
        );
        assert_eq!(
            HandlerError::UnknownEvent("frobnicate".into()).error_code(),
            "unknown_event"
        );
    }

    #[test]
    fn access_denied_maps_to_wire_error() {
        let event = HandlerError::AccessDenied
            .to_error_event()
            .expect("client-visible");
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["type"], "access_denied");
    }

    #[test]
    fn send_errors_have_no_wire_reply() {
        let (tx, rx) = mpsc::channel::<ServerEvent>(1);
        drop(rx);
        let err = tx
            .try_send(ServerEvent::error("x", "y"))
            .expect_err("closed channel");
        let err = match err {
            mpsc::error::TrySendError::Closed(event) => {
                HandlerError::Send(mpsc::error::SendError(event))
            }
            other => panic!("unexpected: {other:?}"),
        };
        assert!(err.to_error_event().is_none());
    }
}
