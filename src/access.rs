//! Room access verification.
//!
//! Access is decided once, at join time, by an external collaborator. The
//! [`RoomAccess`] trait is that collaborator boundary; [`DbRoomAccess`] is
//! the store-backed policy: the room owner is always admitted, public rooms
//! admit everyone, private rooms admit only a matching access code.
//!
//! Membership is never re-verified after admission, even if the room's
//! policy changes later. That matches the upstream behavior and is flagged
//! for product review in DESIGN.md.

use crate::db::{Database, DbError};
use async_trait::async_trait;
use thiserror::Error;

/// Access verification errors (collaborator faults, not denials).
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("room store unavailable: {0}")]
    Store(#[from] DbError),
}

/// External collaborator that decides room admission.
#[async_trait]
pub trait RoomAccess: Send + Sync {
    /// Decide whether `user_id` may enter `room_id`.
    ///
    /// `Ok(false)` is a denial; `Err` is a collaborator fault and is
    /// surfaced to the client as a join failure, not a denial.
    async fn verify(
        &self,
        user_id: &str,
        room_id: &str,
        access_code: Option<&str>,
    ) -> Result<bool, AccessError>;
}

/// Store-backed access policy.
pub struct DbRoomAccess {
    db: Database,
}

impl DbRoomAccess {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RoomAccess for DbRoomAccess {
    async fn verify(
        &self,
        user_id: &str,
        room_id: &str,
        access_code: Option<&str>,
    ) -> Result<bool, AccessError> {
        let Some(room) = self.db.fetch_room(room_id).await? else {
            // Unknown rooms deny rather than error: the client learns
            // nothing about which rooms exist.
            return Ok(false);
        };

        if room.owner_id == user_id {
            return Ok(true);
        }
        if room.is_public {
            return Ok(true);
        }

        Ok(match (room.access_code.as_deref(), access_code) {
            (Some(expected), Some(supplied)) => expected == supplied,
            _ => false,
        })
    }
}
