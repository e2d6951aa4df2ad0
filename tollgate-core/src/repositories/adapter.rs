use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    attempt::{AttemptStats, AttemptSummary, LoginAttempt, NewLoginAttempt, OriginFailures},
    repositories::{LoginAttemptRepository, RepositoryProvider},
};

/// Adapter that wraps a RepositoryProvider and implements LoginAttemptRepository
pub struct LoginAttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginAttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for LoginAttemptRepositoryAdapter<R> {
    async fn insert(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        self.provider.login_attempt().insert(attempt).await
    }

    async fn failed_stats(
        &self,
        identity: &str,
        origin: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        self.provider
            .login_attempt()
            .failed_stats(identity, origin, since)
            .await
    }

    async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.login_attempt().delete_before(before).await
    }

    async fn delete_successful(&self, identity: &str) -> Result<u64, Error> {
        self.provider.login_attempt().delete_successful(identity).await
    }

    async fn summary(&self, since: DateTime<Utc>) -> Result<AttemptSummary, Error> {
        self.provider.login_attempt().summary(since).await
    }

    async fn failures_by_origin(
        &self,
        since: DateTime<Utc>,
        min_failures: u32,
    ) -> Result<Vec<OriginFailures>, Error> {
        self.provider
            .login_attempt()
            .failures_by_origin(since, min_failures)
            .await
    }
}
