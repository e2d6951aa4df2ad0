//! SQLite implementation of the login-attempt repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tollgate_core::{
    AttemptId, AttemptStats, AttemptSummary, Error, LoginAttempt, NewLoginAttempt,
    OriginFailures, error::StorageError, repositories::LoginAttemptRepository,
};

/// SQLite repository for the login-attempt ledger.
pub struct SqliteLoginAttemptRepository {
    pool: SqlitePool,
}

impl SqliteLoginAttemptRepository {
    /// Create a new SQLite login-attempt repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteLoginAttempt {
    id: i64,
    identity: String,
    origin: String,
    succeeded: bool,
    occurred_at: i64,
}

impl TryFrom<SqliteLoginAttempt> for LoginAttempt {
    type Error = Error;

    fn try_from(row: SqliteLoginAttempt) -> Result<Self, Self::Error> {
        Ok(LoginAttempt {
            id: AttemptId::new(row.id),
            identity: row.identity,
            origin: row.origin,
            succeeded: row.succeeded,
            occurred_at: from_millis(row.occurred_at)?,
        })
    }
}

/// Internal struct for the identity-or-origin failure query
#[derive(Debug, sqlx::FromRow)]
struct SqliteAttemptStats {
    count: i64,
    latest_at: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteAttemptSummary {
    total_attempts: i64,
    failed_attempts: i64,
    distinct_identities: i64,
    distinct_origins: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteOriginFailures {
    origin: String,
    failed_attempts: i64,
    distinct_identities: i64,
    last_failed_at: i64,
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        tracing::error!(millis, "Stored login attempt timestamp is out of range");
        StorageError::Database("Invalid login attempt timestamp".to_string()).into()
    })
}

#[async_trait]
impl LoginAttemptRepository for SqliteLoginAttemptRepository {
    async fn insert(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let row = sqlx::query_as::<_, SqliteLoginAttempt>(
            r#"
            INSERT INTO login_attempts (identity, origin, succeeded, occurred_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, identity, origin, succeeded, occurred_at
            "#,
        )
        .bind(&attempt.identity)
        .bind(&attempt.origin)
        .bind(attempt.succeeded)
        .bind(attempt.occurred_at.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record login attempt");
            StorageError::Database("Failed to record login attempt".to_string())
        })?;

        row.try_into()
    }

    async fn failed_stats(
        &self,
        identity: &str,
        origin: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        let row = sqlx::query_as::<_, SqliteAttemptStats>(
            r#"
            SELECT
                COUNT(*) AS count,
                MAX(occurred_at) AS latest_at
            FROM login_attempts
            WHERE (identity = ? OR origin = ?)
            AND succeeded = 0
            AND occurred_at >= ?
            "#,
        )
        .bind(identity)
        .bind(origin)
        .bind(since.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get failed attempt stats");
            StorageError::Database("Failed to get failed attempt stats".to_string())
        })?;

        Ok(AttemptStats {
            failed_count: row.count as u32,
            latest_failed_at: row.latest_at.map(from_millis).transpose()?,
        })
    }

    async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE occurred_at < ?")
            .bind(before.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to cleanup old login attempts");
                StorageError::Database("Failed to cleanup old login attempts".to_string())
            })?;

        Ok(result.rows_affected())
    }

    async fn delete_successful(&self, identity: &str) -> Result<u64, Error> {
        let result =
            sqlx::query("DELETE FROM login_attempts WHERE identity = ? AND succeeded = 1")
                .bind(identity)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to clear successful login attempts");
                    StorageError::Database("Failed to clear successful login attempts".to_string())
                })?;

        Ok(result.rows_affected())
    }

    async fn summary(&self, since: DateTime<Utc>) -> Result<AttemptSummary, Error> {
        let row = sqlx::query_as::<_, SqliteAttemptSummary>(
            r#"
            SELECT
                COUNT(*) AS total_attempts,
                COALESCE(SUM(CASE WHEN succeeded = 0 THEN 1 ELSE 0 END), 0) AS failed_attempts,
                COUNT(DISTINCT identity) AS distinct_identities,
                COUNT(DISTINCT origin) AS distinct_origins
            FROM login_attempts
            WHERE occurred_at >= ?
            "#,
        )
        .bind(since.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to summarize login attempts");
            StorageError::Database("Failed to summarize login attempts".to_string())
        })?;

        Ok(AttemptSummary {
            total_attempts: row.total_attempts as u64,
            failed_attempts: row.failed_attempts as u64,
            successful_attempts: (row.total_attempts - row.failed_attempts) as u64,
            distinct_identities: row.distinct_identities as u64,
            distinct_origins: row.distinct_origins as u64,
        })
    }

    async fn failures_by_origin(
        &self,
        since: DateTime<Utc>,
        min_failures: u32,
    ) -> Result<Vec<OriginFailures>, Error> {
        let rows = sqlx::query_as::<_, SqliteOriginFailures>(
            r#"
            SELECT
                origin,
                COUNT(*) AS failed_attempts,
                COUNT(DISTINCT identity) AS distinct_identities,
                MAX(occurred_at) AS last_failed_at
            FROM login_attempts
            WHERE succeeded = 0 AND occurred_at >= ?
            GROUP BY origin
            HAVING COUNT(*) >= ?
            ORDER BY failed_attempts DESC, origin ASC
            "#,
        )
        .bind(since.timestamp_millis())
        .bind(i64::from(min_failures))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to group failed login attempts by origin");
            StorageError::Database("Failed to group failed login attempts by origin".to_string())
        })?;

        rows.into_iter()
            .map(|row| {
                Ok(OriginFailures {
                    origin: row.origin,
                    failed_attempts: row.failed_attempts as u64,
                    distinct_identities: row.distinct_identities as u64,
                    last_failed_at: from_millis(row.last_failed_at)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::{SqliteMigrationManager, migrations};
    use chrono::Duration;
    use tollgate_migration::MigrationManager;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");

        let manager = SqliteMigrationManager::new(pool.clone());
        manager
            .initialize()
            .await
            .expect("Failed to initialize migrations");
        manager
            .up(&migrations())
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn attempt(identity: &str, origin: &str, succeeded: bool, at: DateTime<Utc>) -> NewLoginAttempt {
        NewLoginAttempt {
            identity: identity.to_string(),
            origin: origin.to_string(),
            succeeded,
            occurred_at: at,
        }
    }

    #[tokio::test]
    async fn test_insert_returns_record() {
        let repo = SqliteLoginAttemptRepository::new(setup_test_db().await);
        let now = Utc::now();

        let record = repo
            .insert(attempt("test@example.com", "192.168.1.1", false, now))
            .await
            .expect("Failed to record attempt");

        assert!(record.id.as_i64() > 0);
        assert_eq!(record.identity, "test@example.com");
        assert_eq!(record.origin, "192.168.1.1");
        assert!(!record.succeeded);
        assert_eq!(record.occurred_at.timestamp_millis(), now.timestamp_millis());
    }

    #[tokio::test]
    async fn test_identical_attempts_are_distinct_rows() {
        let repo = SqliteLoginAttemptRepository::new(setup_test_db().await);
        let now = Utc::now();

        let first = repo
            .insert(attempt("test@example.com", "192.168.1.1", false, now))
            .await
            .unwrap();
        let second = repo
            .insert(attempt("test@example.com", "192.168.1.1", false, now))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        let stats = repo
            .failed_stats("test@example.com", "192.168.1.1", now - Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 2);
    }

    #[tokio::test]
    async fn test_failed_stats_matches_identity_or_origin() {
        let repo = SqliteLoginAttemptRepository::new(setup_test_db().await);
        let now = Utc::now();

        repo.insert(attempt("a@example.com", "10.0.0.1", false, now - Duration::minutes(2)))
            .await
            .unwrap();
        repo.insert(attempt("b@example.com", "10.0.0.1", false, now - Duration::minutes(1)))
            .await
            .unwrap();
        repo.insert(attempt("a@example.com", "10.0.0.2", false, now))
            .await
            .unwrap();
        repo.insert(attempt("c@example.com", "10.0.0.3", false, now))
            .await
            .unwrap();
        repo.insert(attempt("a@example.com", "10.0.0.1", true, now))
            .await
            .unwrap();

        let stats = repo
            .failed_stats("a@example.com", "10.0.0.1", now - Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 3);
        assert_eq!(
            stats.latest_failed_at.map(|t| t.timestamp_millis()),
            Some(now.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_failed_stats_respects_since() {
        let repo = SqliteLoginAttemptRepository::new(setup_test_db().await);
        let now = Utc::now();

        repo.insert(attempt("test@example.com", "10.0.0.1", false, now))
            .await
            .unwrap();

        let stats = repo
            .failed_stats("test@example.com", "10.0.0.1", now + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(stats.failed_count, 0);
        assert!(stats.latest_failed_at.is_none());
    }

    #[tokio::test]
    async fn test_delete_before() {
        let repo = SqliteLoginAttemptRepository::new(setup_test_db().await);
        let now = Utc::now();

        repo.insert(attempt("old@example.com", "10.0.0.1", false, now - Duration::hours(25)))
            .await
            .unwrap();
        repo.insert(attempt("old@example.com", "10.0.0.1", true, now - Duration::hours(25)))
            .await
            .unwrap();
        repo.insert(attempt("new@example.com", "10.0.0.1", false, now - Duration::hours(23)))
            .await
            .unwrap();

        let cutoff = now - Duration::hours(24);
        assert_eq!(repo.delete_before(cutoff).await.unwrap(), 2);
        assert_eq!(repo.delete_before(cutoff).await.unwrap(), 0);

        let summary = repo.summary(now - Duration::days(7)).await.unwrap();
        assert_eq!(summary.total_attempts, 1);
    }

    #[tokio::test]
    async fn test_delete_successful() {
        let repo = SqliteLoginAttemptRepository::new(setup_test_db().await);
        let now = Utc::now();

        repo.insert(attempt("a@example.com", "10.0.0.1", true, now))
            .await
            .unwrap();
        repo.insert(attempt("a@example.com", "10.0.0.1", false, now))
            .await
            .unwrap();
        repo.insert(attempt("b@example.com", "10.0.0.1", true, now))
            .await
            .unwrap();

        assert_eq!(repo.delete_successful("a@example.com").await.unwrap(), 1);

        let summary = repo.summary(now - Duration::minutes(1)).await.unwrap();
        assert_eq!(summary.total_attempts, 2);
        assert_eq!(summary.failed_attempts, 1);
        assert_eq!(summary.successful_attempts, 1);
    }

    #[tokio::test]
    async fn test_summary_of_empty_ledger() {
        let repo = SqliteLoginAttemptRepository::new(setup_test_db().await);

        let summary = repo.summary(Utc::now() - Duration::hours(24)).await.unwrap();
        assert_eq!(summary, AttemptSummary::default());
    }

    #[tokio::test]
    async fn test_failures_by_origin() {
        let repo = SqliteLoginAttemptRepository::new(setup_test_db().await);
        let now = Utc::now();

        for identity in ["a@example.com", "b@example.com", "c@example.com"] {
            repo.insert(attempt(identity, "6.6.6.6", false, now))
                .await
                .unwrap();
        }
        for _ in 0..3 {
            repo.insert(attempt("a@example.com", "5.5.5.5", false, now))
                .await
                .unwrap();
        }
        repo.insert(attempt("a@example.com", "7.7.7.7", false, now))
            .await
            .unwrap();

        let failures = repo
            .failures_by_origin(now - Duration::hours(24), 3)
            .await
            .unwrap();

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].origin, "5.5.5.5");
        assert_eq!(failures[0].distinct_identities, 1);
        assert_eq!(failures[1].origin, "6.6.6.6");
        assert_eq!(failures[1].failed_attempts, 3);
        assert_eq!(failures[1].distinct_identities, 3);
    }
}
