//! Liveness handler.

use super::{Context, Handler};
use crate::error::HandlerResult;
use crate::events::ServerEvent;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

/// Handler for `ping`. Replies `pong` on the connection's own queue; the
/// inbound frame itself resets the connection's idle deadline.
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, ctx: &Context<'_>, _data: &Value) -> HandlerResult {
        ctx.sender
            .send(ServerEvent::Pong {
                timestamp: Utc::now(),
            })
            .await?;
        Ok(())
    }
}
