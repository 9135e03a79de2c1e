//! Network layer: the Gateway listener and per-client Connection tasks.

mod connection;
mod gateway;

pub use connection::Connection;
pub use gateway::Gateway;

use crate::access::RoomAccess;
use crate::auth::Authenticator;
use crate::handlers::Registry;
use crate::state::Hub;
use std::sync::Arc;
use std::time::Duration;

/// Everything a connection task needs besides its own socket.
pub struct Shared {
    /// Central coordinator state.
    pub hub: Arc<Hub>,
    /// Event handler registry.
    pub registry: Registry,
    /// Bearer-token verifier.
    pub authenticator: Authenticator,
    /// Room access policy.
    pub access: Arc<dyn RoomAccess>,
    /// How long a connection may stay silent before teardown.
    pub idle_timeout: Duration,
}
