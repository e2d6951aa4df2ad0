//! Repository implementations for SQLite storage

pub mod login_attempt;

pub use login_attempt::SqliteLoginAttemptRepository;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tollgate_core::{
    Error,
    error::StorageError,
    repositories::{LoginAttemptRepositoryProvider, RepositoryProvider},
};
use tollgate_migration::MigrationManager;

use crate::migrations::{SqliteMigrationManager, migrations};

/// Repository provider implementation for SQLite
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    login_attempt: SqliteLoginAttemptRepository,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let login_attempt = SqliteLoginAttemptRepository::new(pool.clone());
        Self {
            pool,
            login_attempt,
        }
    }
}

impl LoginAttemptRepositoryProvider for SqliteRepositoryProvider {
    type LoginAttemptRepo = SqliteLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await?;
        manager.up(&migrations()).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}
