//! shutterd - real-time presence and room-broadcast coordinator.
//!
//! Keeps every connected viewer/photographer client synchronized during a
//! live photo-sharing session: authenticates WebSocket connections, tracks
//! identity presence, multiplexes connections into per-session rooms, and
//! fans out chat, upload, and pipeline events to the right subset of
//! connections.
//!
//! The crate is a library plus a thin binary so the state container
//! ([`state::Hub`]) can be constructed and exercised in isolation by tests.

pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod network;
pub mod state;
pub mod store;
