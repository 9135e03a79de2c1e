//! Identity and room store.
//!
//! SQLite-backed view of the identity and session records that the REST
//! surface owns. The coordinator only reads these rows to resolve
//! authenticated identities and to decide room access; the create helpers
//! exist for operator tooling and tests.

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// A stored identity principal.
#[derive(Debug, Clone)]
pub struct IdentityRow {
    pub id: String,
    pub display_name: String,
    pub role: String,
}

/// A stored room (live photo session).
#[derive(Debug, Clone)]
pub struct RoomRow {
    pub id: String,
    pub owner_id: String,
    pub is_public: bool,
    pub access_code: Option<String>,
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open (creating if missing) the store at `path` and run migrations.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout(Some(Self::IDLE_TIMEOUT))
            .test_before_acquire(true)
            .connect_with(options)
            .await?;

        info!(path = %path, "Database connected");

        sqlx::migrate!("./migrations").run(&pool).await?;

        // WAL mode allows reads to happen while writes are in progress
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Look up an identity by id.
    pub async fn fetch_identity(&self, id: &str) -> Result<Option<IdentityRow>, DbError> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            "SELECT id, display_name, role FROM identities WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, display_name, role)| IdentityRow {
            id,
            display_name,
            role,
        }))
    }

    /// Look up a room by id.
    pub async fn fetch_room(&self, id: &str) -> Result<Option<RoomRow>, DbError> {
        let row = sqlx::query_as::<_, (String, String, bool, Option<String>)>(
            "SELECT id, owner_id, is_public, access_code FROM rooms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, owner_id, is_public, access_code)| RoomRow {
            id,
            owner_id,
            is_public,
            access_code,
        }))
    }

    /// Insert an identity. Used by operator tooling and tests.
    pub async fn create_identity(
        &self,
        id: &str,
        display_name: &str,
        role: &str,
    ) -> Result<(), DbError> {
        sqlx::query("INSERT INTO identities (id, display_name, role) VALUES (?, ?, ?)")
            .bind(id)
            .bind(display_name)
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert a room. Used by operator tooling and tests.
    pub async fn create_room(
        &self,
        id: &str,
        owner_id: &str,
        is_public: bool,
        access_code: Option<&str>,
    ) -> Result<(), DbError> {
        sqlx::query("INSERT INTO rooms (id, owner_id, is_public, access_code) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(owner_id)
            .bind(is_public)
            .bind(access_code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
