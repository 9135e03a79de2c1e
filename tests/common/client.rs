//! Test WebSocket client.
//!
//! Speaks the JSON event protocol and provides helpers for asserting on
//! received events.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A test client speaking the coordinator's JSON event protocol.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _response) = connect_async(url).await?;
        Ok(Self { ws })
    }

    /// Send an event frame.
    pub async fn send(&mut self, event: &str, data: Value) -> anyhow::Result<()> {
        let frame = json!({ "event": event, "data": data });
        self.ws.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Send a raw text frame, bypassing frame construction.
    #[allow(dead_code)]
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Receive the next event frame as (event name, data).
    pub async fn recv(&mut self) -> anyhow::Result<(String, Value)> {
        self.recv_timeout(RECV_TIMEOUT).await
    }

    /// Receive an event frame with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<(String, Value)> {
        loop {
            let msg = timeout(dur, self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
            match msg {
                Message::Text(text) => {
                    let frame: Value = serde_json::from_str(&text)?;
                    let event = frame["event"]
                        .as_str()
                        .ok_or_else(|| anyhow::anyhow!("frame without event name: {text}"))?
                        .to_string();
                    let data = frame.get("data").cloned().unwrap_or(Value::Null);
                    return Ok((event, data));
                }
                Message::Close(_) => anyhow::bail!("connection closed"),
                // Transport-level frames are not protocol events
                _ => continue,
            }
        }
    }

    /// Receive events until one matches the given name, returning its data.
    /// Other events arriving first are discarded.
    pub async fn expect_event(&mut self, name: &str) -> anyhow::Result<Value> {
        loop {
            let (event, data) = self.recv().await?;
            if event == name {
                return Ok(data);
            }
        }
    }

    /// Assert that nothing arrives within the given window.
    #[allow(dead_code)]
    pub async fn assert_silent(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_timeout(dur).await {
            Ok((event, data)) => anyhow::bail!("unexpected event {event}: {data}"),
            Err(_) => Ok(()),
        }
    }

    /// Join a session and wait for the ack.
    #[allow(dead_code)]
    pub async fn join(&mut self, session_id: &str, access_code: Option<&str>) -> anyhow::Result<()> {
        let mut data = json!({ "session_id": session_id });
        if let Some(code) = access_code {
            data["access_code"] = json!(code);
        }
        self.send("join_session", data).await?;
        self.expect_event("session_joined").await?;
        Ok(())
    }

    /// Close the connection.
    #[allow(dead_code)]
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
