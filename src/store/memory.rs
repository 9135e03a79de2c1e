//! In-process message store backend.

use super::{MessageStore, ROOM_LOG_CAP, ROOM_LOG_TTL, StoreError};
use crate::events::ChatMessage;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One room's bounded log. Newest entries sit at the front.
struct RoomLog {
    entries: VecDeque<ChatMessage>,
    expires_at: Instant,
}

/// In-memory [`MessageStore`] keyed by room id.
pub struct MemoryStore {
    logs: DashMap<String, RoomLog>,
    cap: usize,
    ttl: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_limits(ROOM_LOG_CAP, ROOM_LOG_TTL)
    }

    /// Custom cap/TTL, for tests and tuning.
    pub fn with_limits(cap: usize, ttl: Duration) -> Self {
        Self {
            logs: DashMap::new(),
            cap,
            ttl,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, room_id: &str, msg: ChatMessage) -> Result<(), StoreError> {
        let mut log = self
            .logs
            .entry(room_id.to_string())
            .or_insert_with(|| RoomLog {
                entries: VecDeque::new(),
                expires_at: Instant::now() + self.ttl,
            });

        log.entries.push_front(msg);
        while log.entries.len() > self.cap {
            log.entries.pop_back();
        }
        log.expires_at = Instant::now() + self.ttl;

        Ok(())
    }

    async fn recent(&self, room_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let Some(log) = self.logs.get(room_id) else {
            return Ok(Vec::new());
        };
        if log.expires_at <= Instant::now() {
            // Expired but not yet swept: present as absent.
            return Ok(Vec::new());
        }
        Ok(log.entries.iter().cloned().collect())
    }

    async fn sweep(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let before = self.logs.len();
        self.logs.retain(|_, log| log.expires_at > now);
        Ok(before - self.logs.len())
    }
}
