//! Database connection and schema management.
//!
//! This module provides SQLite connectivity with:
//! - Connection pool management
//! - WAL mode for concurrent reads
//! - Automatic migration execution
//!
//! # Example
//!
//! ```no_run
//! use dehasher_core::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("dehasher.sqlite")).await?;
//! // Hand db to ResultStore::new(...)
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::instrument;

/// Default maximum number of connections in the pool.
/// Kept low for SQLite since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in milliseconds.
/// Connections will wait this long before returning SQLITE_BUSY.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The parent directory of the database file could not be created.
    #[error("failed to create database directory {path}: {source}")]
    Directory {
        /// Directory that could not be created.
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Database connection wrapper with connection pool.
///
/// Cheap to clone; every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (or creates) the database at `db_path` with the default busy
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        Self::with_busy_timeout(db_path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Opens (or creates) the database at `db_path`.
    ///
    /// This will:
    /// 1. Create the parent directory and database file if missing
    /// 2. Enable WAL mode for concurrent reads
    /// 3. Run any pending migrations
    ///
    /// # Errors
    ///
    /// Returns `DbError::Directory`, `DbError::Connection` or
    /// `DbError::Migration`.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn with_busy_timeout(db_path: &Path, busy_timeout_ms: u32) -> Result<Self, DbError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DbError::Directory {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        // Enable WAL mode for concurrent reads
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        sqlx::query(&format!("PRAGMA busy_timeout={busy_timeout_ms}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory database for testing.
    ///
    /// Single connection, so every query sees the same in-memory schema.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0.to_lowercase() == "wal")
    }

    /// Gracefully closes all connections in the pool.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_new_in_memory_succeeds() {
        let db = Database::new_in_memory().await;
        assert!(db.is_ok(), "Failed to create in-memory database");
    }

    #[tokio::test]
    async fn test_database_results_table_exists() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query("INSERT INTO results (dehashed_id, email) VALUES ('abc', '[\"a@b.c\"]')")
            .execute(db.pool())
            .await;

        assert!(result.is_ok(), "results table should exist after migration");
    }

    #[tokio::test]
    async fn test_database_results_reject_empty_id() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query("INSERT INTO results (dehashed_id) VALUES ('')")
            .execute(db.pool())
            .await;

        assert!(result.is_err(), "empty id should fail the CHECK constraint");
    }

    #[tokio::test]
    async fn test_database_credentials_unique() {
        let db = Database::new_in_memory().await.unwrap();
        let insert = "INSERT INTO credentials (record_id, username, email, password) VALUES ('1', 'u', '', 'p')";

        sqlx::query(insert).execute(db.pool()).await.unwrap();
        let second = sqlx::query(insert).execute(db.pool()).await;

        assert!(second.is_err(), "duplicate credential should be rejected");
    }

    #[tokio::test]
    async fn test_database_with_tempfile_creates_parent_and_enables_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("dehasher.sqlite");

        let db = Database::with_busy_timeout(&db_path, 250).await.unwrap();

        assert!(db_path.exists());
        assert!(db.is_wal_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_database_close_works() {
        let db = Database::new_in_memory().await.unwrap();
        db.close().await;
    }
}
