//! Disabled message store backend.
//!
//! Used when chat history is turned off: appends vanish, every room reads
//! back empty, and broadcasts are unaffected.

use super::{MessageStore, StoreError};
use crate::events::ChatMessage;
use async_trait::async_trait;

pub struct NoopStore;

#[async_trait]
impl MessageStore for NoopStore {
    async fn append(&self, _room_id: &str, _msg: ChatMessage) -> Result<(), StoreError> {
        Ok(())
    }

    async fn recent(&self, _room_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(Vec::new())
    }

    async fn sweep(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}
