//! The Hub - central shared state for the coordinator.
//!
//! The Hub owns the presence registry, room membership directory, the
//! per-connection outgoing senders, and the ephemeral message store handle.
//! It is also the Broadcast & Notification Dispatcher (room fan-out,
//! per-identity delivery, and the typed wrappers external subsystems call)
//! and the Lifecycle/Cleanup Controller (disconnect teardown).
//!
//! All structures are keyed concurrent maps: mutations on the same key are
//! atomic with respect to concurrent access, and mutations on different keys
//! do not block each other. Delivery is fire-and-forget: every send is a
//! non-blocking `try_send`, so a member whose queue is full loses the event
//! and a slow consumer can never stall a broadcaster or another member.

use super::{ConnId, ConnIdGenerator, PresenceRegistry, RoomDirectory};
use crate::auth::Identity;
use crate::events::{IdentityId, Photo, RoomId, ServerEvent};
use crate::store::MessageStore;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Central shared state container, one per server process.
pub struct Hub {
    /// Identity ↔ connection presence index.
    pub presence: PresenceRegistry,
    /// Room → member connections.
    pub rooms: RoomDirectory,
    /// Connection → outgoing event queue.
    senders: DashMap<ConnId, mpsc::Sender<ServerEvent>>,
    /// Connection → verified identity (for departure notices and dedup).
    identities: DashMap<ConnId, Identity>,
    /// Ephemeral per-room message log.
    store: Arc<dyn MessageStore>,
    /// Connection id generator.
    conn_gen: ConnIdGenerator,
}

impl Hub {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            rooms: RoomDirectory::new(),
            senders: DashMap::new(),
            identities: DashMap::new(),
            store,
            conn_gen: ConnIdGenerator::new(),
        }
    }

    /// Generate an id for a newly accepted connection.
    pub fn next_conn_id(&self) -> ConnId {
        self.conn_gen.next()
    }

    /// The ephemeral message store.
    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Register an authenticated connection: sender for routing, identity
    /// for departure notices, presence entry. Idempotent per connection id.
    pub fn register(&self, conn_id: &str, identity: Identity, sender: mpsc::Sender<ServerEvent>) {
        self.presence.register(&identity.id, conn_id);
        self.senders.insert(conn_id.to_string(), sender);
        self.identities.insert(conn_id.to_string(), identity);
    }

    /// The verified identity attached to a connection.
    pub fn identity_of(&self, conn_id: &str) -> Option<Identity> {
        self.identities.get(conn_id).map(|i| i.clone())
    }

    /// Number of live registered connections.
    pub fn connection_count(&self) -> usize {
        self.senders.len()
    }

    /// Send an event to one connection. Fire-and-forget: a full queue drops
    /// the event, a closed queue means the connection is already tearing
    /// down.
    pub fn send_to_conn(&self, conn_id: &str, event: ServerEvent) {
        if let Some(sender) = self.senders.get(conn_id) {
            let _ = sender.try_send(event);
        }
    }

    /// Deliver an event to every connection in the room's member set at
    /// dispatch time, optionally excluding one connection (usually the
    /// originator). Connections joining after dispatch do not receive it;
    /// members whose queue is full lose it.
    pub fn broadcast_to_room(&self, room_id: &str, event: ServerEvent, exclude: Option<&str>) {
        let targets: Vec<mpsc::Sender<ServerEvent>> = self
            .rooms
            .members(room_id)
            .iter()
            .filter(|conn| exclude.is_none_or(|e| e != conn.as_str()))
            .filter_map(|conn| self.senders.get(conn).map(|s| s.clone()))
            .collect();

        debug!(room = %room_id, event = event.name(), targets = targets.len(), "Room broadcast");

        let mut dropped = 0usize;
        for sender in targets {
            if sender.try_send(event.clone()).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(room = %room_id, event = event.name(), dropped, "Events dropped for slow or closing members");
        }
    }

    /// Deliver a notification to every active connection of an identity,
    /// independent of room membership. Silent no-op when the identity has
    /// no connections: no queuing, no error.
    pub fn notify_identity(&self, identity_id: &str, notification: Value) {
        let targets: Vec<mpsc::Sender<ServerEvent>> = self
            .presence
            .connections_for(identity_id)
            .iter()
            .filter_map(|conn| self.senders.get(conn).map(|s| s.clone()))
            .collect();

        if targets.is_empty() {
            return;
        }

        let event = ServerEvent::Notification {
            notification,
            timestamp: Utc::now(),
        };
        for sender in targets {
            let _ = sender.try_send(event.clone());
        }
    }

    /// Push a freshly processed photo to a session's members. Called by the
    /// photo-ingestion pipeline.
    pub fn notify_new_photo(&self, photo: Photo) {
        let room_id = photo.session_id.clone();
        let event = ServerEvent::NewPhoto {
            photo,
            timestamp: Utc::now(),
        };
        self.broadcast_to_room(&room_id, event, None);
    }

    /// Push a photo status change to a session's members.
    pub fn notify_photo_status(&self, room_id: &str, photo_id: &str, status: &str) {
        let event = ServerEvent::PhotoStatusUpdated {
            photo_id: photo_id.to_string(),
            session_id: room_id.to_string(),
            status: status.to_string(),
            timestamp: Utc::now(),
        };
        self.broadcast_to_room(room_id, event, None);
    }

    /// Push a session status change (e.g., ended) to its members. Called by
    /// the session-management subsystem.
    pub fn notify_session_status(&self, room_id: &str, status: &str) {
        let event = ServerEvent::SessionStatusUpdated {
            session_id: room_id.to_string(),
            status: status.to_string(),
            timestamp: Utc::now(),
        };
        self.broadcast_to_room(room_id, event, None);
    }

    /// Identities currently present in a room, deduplicated across their
    /// connections.
    pub fn members_of(&self, room_id: &str) -> Vec<IdentityId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for conn in self.rooms.members(room_id) {
            if let Some(identity) = self.identities.get(&conn)
                && seen.insert(identity.id.clone())
            {
                out.push(identity.id.clone());
            }
        }
        out
    }

    /// Disconnect cleanup. Unregisters presence, removes the connection
    /// from every room with a departure broadcast to the remaining members,
    /// and drops the sender. Safe to call more than once; the second call
    /// finds nothing to tear down.
    pub fn disconnect(&self, conn_id: &str) {
        // Sender first: the departing connection must not receive its own
        // departure notices.
        self.senders.remove(conn_id);

        let identity = self.identities.remove(conn_id).map(|(_, i)| i);
        if let Some(identity) = &identity {
            self.presence.unregister(&identity.id, conn_id);
        }

        let rooms = self.rooms.remove_conn(conn_id);
        if let Some(identity) = &identity {
            for room_id in &rooms {
                self.broadcast_to_room(room_id, ServerEvent::user_left(identity), None);
            }
            debug!(
                conn_id = %conn_id,
                user_id = %identity.id,
                rooms = rooms.len(),
                "Connection cleaned up"
            );
        }
    }

    /// Tell a connection it is about to be terminated. The connection task
    /// writes the event and then closes, which routes through the normal
    /// disconnect cleanup.
    pub fn force_disconnect(&self, conn_id: &str, reason: &str) {
        self.send_to_conn(
            conn_id,
            ServerEvent::ForceDisconnect {
                reason: reason.to_string(),
                timestamp: Utc::now(),
            },
        );
    }
}
