//! Repository implementations for Postgres storage

pub mod login_attempt;

pub use login_attempt::PostgresLoginAttemptRepository;

use async_trait::async_trait;
use sqlx::PgPool;
use tollgate_core::{
    Error,
    error::StorageError,
    repositories::{LoginAttemptRepositoryProvider, RepositoryProvider},
};
use tollgate_migration::MigrationManager;

use crate::migrations::{PostgresMigrationManager, migrations};

/// Repository provider implementation for Postgres
pub struct PostgresRepositoryProvider {
    pool: PgPool,
    login_attempt: PostgresLoginAttemptRepository,
}

impl PostgresRepositoryProvider {
    pub fn new(pool: PgPool) -> Self {
        let login_attempt = PostgresLoginAttemptRepository::new(pool.clone());
        Self {
            pool,
            login_attempt,
        }
    }
}

impl LoginAttemptRepositoryProvider for PostgresRepositoryProvider {
    type LoginAttemptRepo = PostgresLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

#[async_trait]
impl RepositoryProvider for PostgresRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = PostgresMigrationManager::new(self.pool.clone());
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
