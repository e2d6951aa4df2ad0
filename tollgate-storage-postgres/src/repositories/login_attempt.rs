//! Postgres implementation of the login-attempt repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tollgate_core::{
    AttemptId, AttemptStats, AttemptSummary, Error, LoginAttempt, NewLoginAttempt,
    OriginFailures, error::StorageError, repositories::LoginAttemptRepository,
};

/// Postgres repository for the login-attempt ledger.
pub struct PostgresLoginAttemptRepository {
    pool: PgPool,
}

impl PostgresLoginAttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PostgresLoginAttempt {
    id: i64,
    identity: String,
    origin: String,
    succeeded: bool,
    occurred_at: DateTime<Utc>,
}

impl From<PostgresLoginAttempt> for LoginAttempt {
    fn from(row: PostgresLoginAttempt) -> Self {
        LoginAttempt {
            id: AttemptId::new(row.id),
            identity: row.identity,
            origin: row.origin,
            succeeded: row.succeeded,
            occurred_at: row.occurred_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PostgresAttemptStats {
    count: i64,
    latest_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct PostgresAttemptSummary {
    total_attempts: i64,
    failed_attempts: i64,
    distinct_identities: i64,
    distinct_origins: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct PostgresOriginFailures {
    origin: String,
    failed_attempts: i64,
    distinct_identities: i64,
    last_failed_at: DateTime<Utc>,
}

#[async_trait]
impl LoginAttemptRepository for PostgresLoginAttemptRepository {
    async fn insert(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let row = sqlx::query_as::<_, PostgresLoginAttempt>(
            r#"
            INSERT INTO login_attempts (identity, origin, succeeded, occurred_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, identity, origin, succeeded, occurred_at
            "#,
        )
        .bind(&attempt.identity)
        .bind(&attempt.origin)
        .bind(attempt.succeeded)
        .bind(attempt.occurred_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record login attempt");
            StorageError::Database("Failed to record login attempt".to_string())
        })?;

        Ok(row.into())
    }

    async fn failed_stats(
        &self,
        identity: &str,
        origin: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        let row = sqlx::query_as::<_, PostgresAttemptStats>(
            r#"
            SELECT
                COUNT(*) AS count,
                MAX(occurred_at) AS latest_at
            FROM login_attempts
            WHERE (identity = $1 OR origin = $2)
            AND succeeded = FALSE
            AND occurred_at >= $3
            "#,
        )
        .bind(identity)
        .bind(origin)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get failed attempt stats");
            StorageError::Database("Failed to get failed attempt stats".to_string())
        })?;

        Ok(AttemptStats {
            failed_count: row.count as u32,
            latest_failed_at: row.latest_at,
        })
    }

    async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE occurred_at < $1")
            .bind(before)
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
            sqlx::query("DELETE FROM login_attempts WHERE identity = $1 AND succeeded = TRUE")
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
        let row = sqlx::query_as::<_, PostgresAttemptSummary>(
            r#"
            SELECT
                COUNT(*) AS total_attempts,
                COUNT(*) FILTER (WHERE NOT succeeded) AS failed_attempts,
                COUNT(DISTINCT identity) AS distinct_identities,
                COUNT(DISTINCT origin) AS distinct_origins
            FROM login_attempts
            WHERE occurred_at >= $1
            "#,
        )
        .bind(since)
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
        let rows = sqlx::query_as::<_, PostgresOriginFailures>(
            r#"
            SELECT
                origin,
                COUNT(*) AS failed_attempts,
                COUNT(DISTINCT identity) AS distinct_identities,
                MAX(occurred_at) AS last_failed_at
            FROM login_attempts
            WHERE succeeded = FALSE AND occurred_at >= $1
            GROUP BY origin
            HAVING COUNT(*) >= $2
            ORDER BY failed_attempts DESC, origin ASC
            "#,
        )
        .bind(since)
        .bind(i64::from(min_failures))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to group failed login attempts by origin");
            StorageError::Database("Failed to group failed login attempts by origin".to_string())
        })?;

        Ok(rows
            .into_iter()
            .map(|row| OriginFailures {
                origin: row.origin,
                failed_attempts: row.failed_attempts as u64,
                distinct_identities: row.distinct_identities as u64,
                last_failed_at: row.last_failed_at,
            })
            .collect())
    }
}
