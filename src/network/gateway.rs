//! Gateway - TCP listener that accepts incoming WebSocket connections.
//!
//! The Gateway binds to a socket and spawns a Connection task for each
//! incoming client. Origin validation happens during the WebSocket
//! handshake; the bearer token travels in the handshake request (query
//! string or Authorization header) and is captured here, before the
//! upgraded stream is handed to the Connection.

use crate::network::{Connection, Shared};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tracing::{error, info, instrument, warn};

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    allow_origins: Vec<String>,
    shared: Arc<Shared>,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        allow_origins: Vec<String>,
        shared: Arc<Shared>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "WebSocket listener bound");
        Ok(Self {
            listener,
            allow_origins,
            shared,
        })
    }

    /// The address the listener is actually bound to. Useful when binding
    /// to port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!(%addr, "Connection attempt");
                    let shared = Arc::clone(&self.shared);
                    let allowed = self.allow_origins.clone();

                    tokio::spawn(async move {
                        handshake_and_run(stream, addr, allowed, shared).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Perform the WebSocket handshake (with origin validation and token
/// capture) and run the connection to completion.
async fn handshake_and_run(
    stream: TcpStream,
    addr: SocketAddr,
    allowed: Vec<String>,
    shared: Arc<Shared>,
) {
    let mut token: Option<String> = None;

    // CORS validation callback for the WebSocket handshake. Also the only
    // place the upgrade request is visible, so the token is captured here.
    let callback = |req: &http::Request<()>, response: http::Response<()>| {
        token = extract_token(req);

        // If allow_origins is empty, allow all origins
        if allowed.is_empty() {
            return Ok(response);
        }

        if let Some(origin) = req.headers().get("Origin").and_then(|o| o.to_str().ok()) {
            if allowed.iter().any(|a| a == origin || a == "*") {
                return Ok(response);
            }
            warn!(%addr, origin = %origin, "WebSocket CORS rejected");
        }

        Err(http::Response::builder()
            .status(http::StatusCode::FORBIDDEN)
            .body(Some("CORS origin not allowed".to_string()))
            .unwrap())
    };

    match accept_hdr_async(stream, callback).await {
        Ok(ws_stream) => {
            let connection = Connection::new(ws_stream, addr, token, shared);
            if let Err(e) = connection.run().await {
                error!(%addr, error = %e, "Connection error");
            }
            info!(%addr, "Connection closed");
        }
        Err(e) => {
            warn!(%addr, error = %e, "WebSocket handshake failed");
        }
    }
}

/// Pull the bearer token out of the upgrade request: `?token=` query
/// parameter first, `Authorization: Bearer` header as fallback.
fn extract_token(req: &http::Request<()>) -> Option<String> {
    if let Some(query) = req.uri().query() {
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("token=") {
                return Some(value.to_string());
            }
        }
    }

    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}
