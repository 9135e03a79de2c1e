//! Presence registry: identity ↔ active connections.

use super::ConnId;
use crate::events::IdentityId;
use dashmap::DashMap;
use std::collections::HashSet;

/// Live mapping from identity to its active connection set.
///
/// Pure bookkeeping: no errors, no side effects beyond its own state.
/// Invariant: an identity present in the registry has a non-empty connection
/// set; removing the last connection removes the entry. Multiple connections
/// per identity are expected (multi-device).
pub struct PresenceRegistry {
    by_identity: DashMap<IdentityId, HashSet<ConnId>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            by_identity: DashMap::new(),
        }
    }

    /// Add a connection under an identity. Idempotent per connection id.
    pub fn register(&self, identity_id: &str, conn_id: &str) {
        self.by_identity
            .entry(identity_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    /// Remove a connection from its identity's set, dropping the identity
    /// entry if it becomes empty. Safe to call for never-registered pairs.
    pub fn unregister(&self, identity_id: &str, conn_id: &str) {
        if let Some(mut set) = self.by_identity.get_mut(identity_id) {
            set.remove(conn_id);
            let empty = set.is_empty();
            drop(set);
            if empty {
                self.by_identity.remove_if(identity_id, |_, s| s.is_empty());
            }
        }
    }

    /// Snapshot of an identity's active connections (possibly empty).
    pub fn connections_for(&self, identity_id: &str) -> Vec<ConnId> {
        self.by_identity
            .get(identity_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any connection is registered for this identity.
    pub fn is_online(&self, identity_id: &str) -> bool {
        self.by_identity.contains_key(identity_id)
    }

    /// Number of identities currently present.
    pub fn identity_count(&self) -> usize {
        self.by_identity.len()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
