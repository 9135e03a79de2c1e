//! Client event handlers.
//!
//! Contains the Handler trait and the event registry that dispatches
//! decoded client frames by event name. Each handler is a pure function of
//! (context, payload) → side effects on the Hub, which keeps every handler
//! independently unit-testable.

mod liveness;
mod messaging;
mod session;

pub use liveness::PingHandler;
pub use messaging::{SendMessageHandler, UploadProgressHandler};
pub use session::{JoinSessionHandler, LeaveSessionHandler};

use crate::access::RoomAccess;
use crate::auth::Identity;
use crate::error::{HandlerError, HandlerResult};
use crate::events::{ClientFrame, ServerEvent};
use crate::state::Hub;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handler context passed to each event handler.
pub struct Context<'a> {
    /// The connection's unique id.
    pub conn_id: &'a str,
    /// The verified identity attached at authentication time.
    pub identity: &'a Identity,
    /// Shared coordinator state.
    pub hub: &'a Arc<Hub>,
    /// Room access verification collaborator.
    pub access: &'a Arc<dyn RoomAccess>,
    /// Outgoing queue of this connection, for direct replies and acks.
    pub sender: &'a mpsc::Sender<ServerEvent>,
}

/// Decode an event payload into the handler's payload type.
pub(crate) fn decode<T: DeserializeOwned>(data: &Value) -> Result<T, HandlerError> {
    serde_json::from_value(data.clone()).map_err(|e| HandlerError::BadPayload(e.to_string()))
}

/// Trait implemented by all event handlers.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle an incoming event payload.
    async fn handle(&self, ctx: &Context<'_>, data: &Value) -> HandlerResult;
}

/// Registry of event handlers, keyed by wire event name.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    /// Create a new registry with all handlers registered.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        // Session membership
        handlers.insert("join_session", Box::new(JoinSessionHandler));
        handlers.insert("leave_session", Box::new(LeaveSessionHandler));

        // Messaging
        handlers.insert("send_message", Box::new(SendMessageHandler));
        handlers.insert("upload_progress", Box::new(UploadProgressHandler));

        // Liveness
        handlers.insert("ping", Box::new(PingHandler));

        Self { handlers }
    }

    /// Dispatch a decoded frame to the appropriate handler.
    pub async fn dispatch(&self, ctx: &Context<'_>, frame: &ClientFrame) -> HandlerResult {
        match self.handlers.get(frame.event.as_str()) {
            Some(handler) => handler.handle(ctx, &frame.data).await,
            None => Err(HandlerError::UnknownEvent(frame.event.clone())),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
