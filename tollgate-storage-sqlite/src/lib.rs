//! SQLite storage backend for tollgate
//!
//! Login attempts are kept in a single `login_attempts` table with
//! timestamps stored as unix milliseconds. Use [`SqliteStorage::connect`]
//! to open a database by URL, then [`SqliteStorage::into_repository_provider`]
//! to hand it to the ledger.

mod migrations;
pub mod repositories;

use std::str::FromStr;

use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};
use tollgate_core::{Error, error::StorageError};
use tollgate_migration::MigrationManager;

pub use migrations::{SqliteMigrationManager, migrations};
pub use repositories::{SqliteLoginAttemptRepository, SqliteRepositoryProvider};

#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `database_url`, creating the database file if needed.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite database");
            StorageError::Connection(e.to_string())
        })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await?;
        manager.up(&migrations()).await?;
        Ok(())
    }

    /// Create a repository provider from this storage instance
    pub fn into_repository_provider(self) -> SqliteRepositoryProvider {
        SqliteRepositoryProvider::new(self.pool)
    }
}
