//! Per-client connection task.
//!
//! Each accepted WebSocket gets one Connection. The lifecycle is:
//! authenticate the handshake token, register with the Hub, send the
//! `connected` ack, then run a unified event loop multiplexing inbound
//! frames, the outgoing queue, and the idle deadline. Whatever way the
//! loop exits, Hub::disconnect runs exactly once afterwards.

use crate::error::HandlerError;
use crate::events::{ClientFrame, ServerEvent};
use crate::handlers::Context;
use crate::network::Shared;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Outgoing queue depth per connection. A slow consumer that falls this
/// far behind starts losing events rather than stalling broadcasters.
const OUTGOING_QUEUE_DEPTH: usize = 64;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// One task per accepted client socket.
pub struct Connection {
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    token: Option<String>,
    shared: Arc<Shared>,
}

enum LoopStep {
    /// Keep looping.
    Continue,
    /// Write these events, then keep looping.
    Reply(Vec<ServerEvent>),
    /// Write these events, then tear down.
    Close(Vec<ServerEvent>),
}

impl Connection {
    pub fn new(
        ws: WebSocketStream<TcpStream>,
        addr: SocketAddr,
        token: Option<String>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            ws,
            addr,
            token,
            shared,
        }
    }

    /// Run the connection to completion.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            ws,
            addr,
            token,
            shared,
        } = self;
        let (mut ws_tx, mut ws_rx) = ws.split();

        // Authentication gate: a bad token never touches shared state. The
        // client gets one error frame and the socket closes.
        let identity = match shared.authenticator.authenticate(token.as_deref()).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(%addr, error = %e, "Authentication failed");
                write_event(&mut ws_tx, &ServerEvent::error(e.error_code(), e.to_string()))
                    .await?;
                let _ = ws_tx.send(Message::Close(None)).await;
                return Ok(());
            }
        };

        let conn_id = shared.hub.next_conn_id();
        let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTGOING_QUEUE_DEPTH);
        shared.hub.register(&conn_id, identity.clone(), tx.clone());

        info!(
            conn_id = %conn_id,
            %addr,
            user_id = %identity.id,
            "Connection registered"
        );
        write_event(&mut ws_tx, &ServerEvent::connected(&identity.id)).await?;

        let mut idle_deadline = Instant::now() + shared.idle_timeout;

        loop {
            let step = tokio::select! {
                frame = ws_rx.next() => {
                    // Any inbound frame, ping included, proves liveness.
                    idle_deadline = Instant::now() + shared.idle_timeout;
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            let ctx = Context {
                                conn_id: &conn_id,
                                identity: &identity,
                                hub: &shared.hub,
                                access: &shared.access,
                                sender: &tx,
                            };
                            handle_frame(&ctx, &shared, &text).await
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(conn_id = %conn_id, "Client disconnected");
                            LoopStep::Close(Vec::new())
                        }
                        Some(Ok(_)) => LoopStep::Continue,
                        Some(Err(e)) => {
                            debug!(conn_id = %conn_id, error = %e, "Read error");
                            LoopStep::Close(Vec::new())
                        }
                    }
                }

                event = rx.recv() => match event {
                    Some(event @ ServerEvent::ForceDisconnect { .. }) => {
                        info!(conn_id = %conn_id, "Forced disconnect");
                        LoopStep::Close(vec![event])
                    }
                    Some(event) => LoopStep::Reply(vec![event]),
                    // Sender side gone; the Hub already forgot this connection.
                    None => LoopStep::Close(Vec::new()),
                },

                _ = tokio::time::sleep_until(idle_deadline) => {
                    info!(
                        conn_id = %conn_id,
                        idle_secs = shared.idle_timeout.as_secs(),
                        "Idle timeout"
                    );
                    LoopStep::Close(Vec::new())
                }
            };

            match step {
                LoopStep::Continue => {}
                LoopStep::Reply(events) => {
                    for event in &events {
                        if write_event(&mut ws_tx, event).await.is_err() {
                            shared.hub.disconnect(&conn_id);
                            return Ok(());
                        }
                    }
                }
                LoopStep::Close(events) => {
                    for event in &events {
                        let _ = write_event(&mut ws_tx, event).await;
                    }
                    break;
                }
            }
        }

        let _ = ws_tx.send(Message::Close(None)).await;
        shared.hub.disconnect(&conn_id);
        Ok(())
    }
}

/// Decode and dispatch one inbound text frame. Handler failures become
/// error events on the same connection; the connection itself survives.
async fn handle_frame(ctx: &Context<'_>, shared: &Shared, text: &str) -> LoopStep {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(conn_id = %ctx.conn_id, error = %e, "Malformed frame");
            return LoopStep::Reply(vec![ServerEvent::error(
                "invalid_payload",
                format!("malformed frame: {e}"),
            )]);
        }
    };

    match shared.registry.dispatch(ctx, &frame).await {
        Ok(()) => LoopStep::Continue,
        Err(HandlerError::Send(_)) => LoopStep::Close(Vec::new()),
        Err(e) => {
            debug!(
                conn_id = %ctx.conn_id,
                event = %frame.event,
                error = %e,
                "Handler rejected frame"
            );
            match e.to_error_event() {
                Some(event) => LoopStep::Reply(vec![event]),
                None => LoopStep::Continue,
            }
        }
    }
}

async fn write_event(
    ws_tx: &mut WsSink,
    event: &ServerEvent,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    // ServerEvent serializes to the {"event", "data"} wire shape.
    let json = serde_json::to_string(event).unwrap_or_else(|_| {
        r#"{"event":"error","data":{"type":"internal","message":"serialization failed"}}"#
            .to_string()
    });
    ws_tx.send(Message::Text(json)).await
}
