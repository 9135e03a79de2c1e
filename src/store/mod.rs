//! Ephemeral message store abstraction.
//!
//! Each room keeps a bounded, expiring log of recent chat messages. The log
//! is deliberately non-durable: it never outlives the process, caps out at
//! [`ROOM_LOG_CAP`] entries, and disappears entirely once a room has gone
//! [`ROOM_LOG_TTL`] without a new append.
//!
//! Store failures are non-fatal by contract: callers log and drop the
//! append, and the live broadcast proceeds regardless.

use crate::events::ChatMessage;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod noop;

/// Maximum retained messages per room (most recent kept).
pub const ROOM_LOG_CAP: usize = 100;

/// A room's log expires this long after its last append.
pub const ROOM_LOG_TTL: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("message store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to the room's log, truncating to the cap and
    /// refreshing the room's expiry.
    async fn append(&self, room_id: &str, msg: ChatMessage) -> Result<(), StoreError>;

    /// Snapshot of the room's log, newest-to-oldest. Empty for unknown or
    /// expired rooms.
    async fn recent(&self, room_id: &str) -> Result<Vec<ChatMessage>, StoreError>;

    /// Drop room logs whose TTL has lapsed. Returns the number of rooms
    /// discarded. Called periodically from a maintenance task.
    async fn sweep(&self) -> Result<usize, StoreError>;
}
