//! Postgres storage backend for tollgate
//!
//! Timestamps are stored as `TIMESTAMPTZ`. Tests in this crate need a
//! running server and are ignored by default; set
//! `TOLLGATE_TEST_POSTGRES_URL` and run them with `--ignored`.

mod migrations;
pub mod repositories;

use sqlx::PgPool;
use tollgate_core::{Error, error::StorageError};
use tollgate_migration::MigrationManager;

pub use migrations::{PostgresMigrationManager, migrations};
pub use repositories::{PostgresLoginAttemptRepository, PostgresRepositoryProvider};

#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = PgPool::connect(database_url).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to Postgres database");
            StorageError::Connection(e.to_string())
        })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        let manager = PostgresMigrationManager::new(self.pool.clone());
        manager.initialize().await?;
        manager.up(&migrations()).await?;
        Ok(())
    }

    /// Create a repository provider from this storage instance
    pub fn into_repository_provider(self) -> PostgresRepositoryProvider {
        PostgresRepositoryProvider::new(self.pool)
    }
}
