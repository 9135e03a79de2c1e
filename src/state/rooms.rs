//! Room membership directory.

use super::ConnId;
use crate::events::RoomId;
use dashmap::DashMap;
use std::collections::HashSet;

/// Live mapping from room to the connections currently admitted into it,
/// with a reverse index for disconnect cleanup.
///
/// Room entries are garbage-collected when their member set becomes empty.
/// The two indexes stay consistent because all mutations for a given
/// connection originate from that connection's own task, which processes
/// its events in order.
pub struct RoomDirectory {
    members: DashMap<RoomId, HashSet<ConnId>>,
    by_conn: DashMap<ConnId, HashSet<RoomId>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
            by_conn: DashMap::new(),
        }
    }

    /// Admit a connection into a room. Returns false if it was already a
    /// member (set semantics; callers decide whether to re-broadcast).
    pub fn insert(&self, room_id: &str, conn_id: &str) -> bool {
        let added = self
            .members
            .entry(room_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
        self.by_conn
            .entry(conn_id.to_string())
            .or_default()
            .insert(room_id.to_string());
        added
    }

    /// Remove a connection from a room. No-op (false) if absent.
    pub fn remove(&self, room_id: &str, conn_id: &str) -> bool {
        let removed = if let Some(mut set) = self.members.get_mut(room_id) {
            let removed = set.remove(conn_id);
            let empty = set.is_empty();
            drop(set);
            if empty {
                self.members.remove_if(room_id, |_, s| s.is_empty());
            }
            removed
        } else {
            false
        };

        if let Some(mut rooms) = self.by_conn.get_mut(conn_id) {
            rooms.remove(room_id);
            let empty = rooms.is_empty();
            drop(rooms);
            if empty {
                self.by_conn.remove_if(conn_id, |_, s| s.is_empty());
            }
        }

        removed
    }

    /// Remove a connection from every room it was in, returning those rooms.
    /// Used by disconnect cleanup.
    pub fn remove_conn(&self, conn_id: &str) -> Vec<RoomId> {
        let rooms: Vec<RoomId> = self
            .by_conn
            .remove(conn_id)
            .map(|(_, set)| set.into_iter().collect())
            .unwrap_or_default();

        for room_id in &rooms {
            if let Some(mut set) = self.members.get_mut(room_id) {
                set.remove(conn_id);
                let empty = set.is_empty();
                drop(set);
                if empty {
                    self.members.remove_if(room_id, |_, s| s.is_empty());
                }
            }
        }

        rooms
    }

    /// Snapshot of a room's member connections (possibly empty).
    pub fn members(&self, room_id: &str) -> Vec<ConnId> {
        self.members
            .get(room_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the rooms a connection belongs to.
    pub fn rooms_of(&self, conn_id: &str) -> Vec<RoomId> {
        self.by_conn
            .get(conn_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a connection is currently a member of a room.
    pub fn is_member(&self, room_id: &str, conn_id: &str) -> bool {
        self.members
            .get(room_id)
            .is_some_and(|set| set.contains(conn_id))
    }

    /// Whether a room currently has any members.
    pub fn exists(&self, room_id: &str) -> bool {
        self.members.contains_key(room_id)
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.members.len()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
