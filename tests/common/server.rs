//! Test server management.
//!
//! Runs a shutterd instance in-process for integration testing. The
//! gateway binds to an ephemeral port; the Hub handle stays available so
//! tests can drive the notification wrappers and inspect state directly.

use shutterd::access::DbRoomAccess;
use shutterd::auth::{Authenticator, Claims, sign_token};
use shutterd::db::Database;
use shutterd::handlers::Registry;
use shutterd::network::{Gateway, Shared};
use shutterd::state::Hub;
use shutterd::store::memory::MemoryStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TEST_SECRET: &str = "integration-test-secret-0123456789";

/// A test server instance. Dropping it aborts the gateway task and
/// removes the scratch database.
pub struct TestServer {
    pub hub: Arc<Hub>,
    pub db: Database,
    addr: SocketAddr,
    gateway_task: tokio::task::JoinHandle<()>,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a server on an ephemeral port, seeded with the standard test
    /// fixtures: identities alice (photographer), bob and carol (viewers);
    /// a public room "open-day" and a private room "wedding" (code "XYZ"),
    /// both owned by alice.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with_idle_timeout(Duration::from_secs(60)).await
    }

    /// Spawn with a custom idle timeout, for liveness tests.
    #[allow(dead_code)]
    pub async fn spawn_with_idle_timeout(idle_timeout: Duration) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let db_path = data_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().expect("utf8 path")).await?;

        db.create_identity("alice", "Alice", "photographer").await?;
        db.create_identity("bob", "Bob", "viewer").await?;
        db.create_identity("carol", "Carol", "viewer").await?;
        db.create_room("open-day", "alice", true, None).await?;
        db.create_room("wedding", "alice", false, Some("XYZ")).await?;

        let hub = Arc::new(Hub::new(Arc::new(MemoryStore::new())));
        let shared = Arc::new(Shared {
            hub: Arc::clone(&hub),
            registry: Registry::new(),
            authenticator: Authenticator::new(TEST_SECRET, db.clone()),
            access: Arc::new(DbRoomAccess::new(db.clone())),
            idle_timeout,
        });

        let gateway = Gateway::bind("127.0.0.1:0".parse()?, Vec::new(), shared).await?;
        let addr = gateway.local_addr()?;
        let gateway_task = tokio::spawn(async move {
            let _ = gateway.run().await;
        });

        Ok(Self {
            hub,
            db,
            addr,
            gateway_task,
            _data_dir: data_dir,
        })
    }

    /// The address the gateway is listening on.
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Mint a valid token for the given identity id.
    pub fn token_for(&self, user_id: &str) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        sign_token(TEST_SECRET, &claims)
    }

    /// Mint an already-expired token for the given identity id.
    #[allow(dead_code)]
    pub fn expired_token_for(&self, user_id: &str) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: chrono::Utc::now().timestamp() - 60,
        };
        sign_token(TEST_SECRET, &claims)
    }

    /// Connect a client authenticated as the given identity and wait for
    /// the `connected` ack.
    pub async fn connect(&self, user_id: &str) -> anyhow::Result<super::client::TestClient> {
        let token = self.token_for(user_id);
        let mut client = self.connect_raw(Some(&token)).await?;
        client.expect_event("connected").await?;
        Ok(client)
    }

    /// Connect with an arbitrary (possibly missing or invalid) token,
    /// without waiting for any ack.
    pub async fn connect_raw(
        &self,
        token: Option<&str>,
    ) -> anyhow::Result<super::client::TestClient> {
        let url = match token {
            Some(token) => format!("ws://{}/ws?token={}", self.addr, token),
            None => format!("ws://{}/ws", self.addr),
        };
        super::client::TestClient::connect(&url).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.gateway_task.abort();
    }
}
