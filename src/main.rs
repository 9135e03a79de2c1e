//! shutterd - real-time presence and room-broadcast coordinator.

use shutterd::access::DbRoomAccess;
use shutterd::auth::Authenticator;
use shutterd::config::Config;
use shutterd::db::Database;
use shutterd::handlers::Registry;
use shutterd::network::{Gateway, Shared};
use shutterd::state::Hub;
use shutterd::store::MessageStore;
use shutterd::store::memory::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// How often expired room logs are swept.
const STORE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

const MIN_SECRET_LEN: usize = 16;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(server = %config.server.name, "Starting shutterd");

    // SECURITY: Refuse to start with a weak token secret. Anyone who can
    // guess it can mint valid connection tokens.
    if config.auth.token_secret.len() < MIN_SECRET_LEN {
        if std::env::var("SHUTTERD_ALLOW_WEAK_SECRET").is_ok() {
            tracing::warn!(
                "⚠️  INSECURE: Running with weak token_secret (allowed via SHUTTERD_ALLOW_WEAK_SECRET)"
            );
        } else {
            error!("FATAL: Weak token_secret detected!");
            error!("  The token_secret verifies the HMAC signature on bearer tokens.");
            error!("  A short secret makes forged tokens practical.");
            error!("");
            error!("  To fix, set a strong secret in config.toml:");
            error!("    [auth]");
            error!("    token_secret = \"<random-32-char-string>\"");
            error!("");
            error!("  Generate a secure secret with:");
            error!("    openssl rand -hex 32");
            error!("");
            error!("  For testing only, set SHUTTERD_ALLOW_WEAK_SECRET=1 to bypass this check.");
            return Err(anyhow::anyhow!(
                "Refusing to start with weak token_secret. See error messages above."
            ));
        }
    }

    // Initialize the identity/room store
    let db_path = config
        .database
        .as_ref()
        .map(|d| d.path.as_str())
        .unwrap_or("shutterd.db");
    let db = Database::new(db_path).await?;

    // Ephemeral per-room message logs live in process memory only.
    let store: Arc<dyn MessageStore> = Arc::new(MemoryStore::new());
    let hub = Arc::new(Hub::new(Arc::clone(&store)));

    // Start the room-log sweeper task
    {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STORE_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                match store.sweep().await {
                    Ok(removed) if removed > 0 => {
                        info!(removed = removed, "Expired room logs swept");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Room log sweep failed");
                    }
                }
            }
        });
    }
    info!("Room log sweeper task started");

    let shared = Arc::new(Shared {
        hub,
        registry: Registry::new(),
        authenticator: Authenticator::new(config.auth.token_secret.clone(), db.clone()),
        access: Arc::new(DbRoomAccess::new(db.clone())),
        idle_timeout: Duration::from_secs(config.timeouts.idle_secs),
    });

    // Start the Gateway
    let gateway = Gateway::bind(
        config.listen.address,
        config.listen.allow_origins.clone(),
        shared,
    )
    .await?;

    gateway.run().await?;

    Ok(())
}
