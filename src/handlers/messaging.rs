//! Messaging handlers.
//!
//! Handles `send_message` (ephemeral log append + room broadcast) and
//! `upload_progress` (room rebroadcast). Both require the connection to be
//! a current member of the target session: membership is the proof that
//! access verification passed at join time, and checking it here keeps a
//! denied connection from injecting into a room it was refused.

use super::{Context, Handler, decode};
use crate::error::{HandlerError, HandlerResult};
use crate::events::{ChatMessage, SendMessage, ServerEvent, UploadProgress};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::warn;

/// Handler for `send_message`.
pub struct SendMessageHandler;

#[async_trait]
impl Handler for SendMessageHandler {
    async fn handle(&self, ctx: &Context<'_>, data: &Value) -> HandlerResult {
        let payload: SendMessage = decode(data)?;

        if !ctx.hub.rooms.is_member(&payload.session_id, ctx.conn_id) {
            return Err(HandlerError::AccessDenied);
        }

        let msg = ChatMessage::new(
            &payload.session_id,
            ctx.identity,
            payload.body,
            payload.kind,
        );

        // Persistence is best-effort: a store fault drops the append and is
        // never surfaced to the client. The live broadcast proceeds.
        if let Err(e) = ctx.hub.store().append(&payload.session_id, msg.clone()).await {
            warn!(
                session = %payload.session_id,
                error = %e,
                "Message append dropped"
            );
        }

        ctx.hub
            .broadcast_to_room(&payload.session_id, ServerEvent::NewMessage(msg), None);

        Ok(())
    }
}

/// Handler for `upload_progress`.
///
/// Rebroadcast to the room as `photo_upload_progress`, excluding the
/// reporting connection.
pub struct UploadProgressHandler;

#[async_trait]
impl Handler for UploadProgressHandler {
    async fn handle(&self, ctx: &Context<'_>, data: &Value) -> HandlerResult {
        let payload: UploadProgress = decode(data)?;

        if !ctx.hub.rooms.is_member(&payload.session_id, ctx.conn_id) {
            return Err(HandlerError::AccessDenied);
        }

        let event = ServerEvent::PhotoUploadProgress {
            session_id: payload.session_id.clone(),
            user_id: ctx.identity.id.clone(),
            filename: payload.filename,
            progress: payload.progress,
            status: payload.status,
            timestamp: Utc::now(),
        };

        ctx.hub
            .broadcast_to_room(&payload.session_id, event, Some(ctx.conn_id));

        Ok(())
    }
}
