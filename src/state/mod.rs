//! State management module.
//!
//! Contains the Hub (shared coordinator state) and its supporting indexes.

mod conn;
mod hub;
mod presence;
mod rooms;

pub use conn::{ConnId, ConnIdGenerator};
pub use hub::Hub;
pub use presence::PresenceRegistry;
pub use rooms::RoomDirectory;
