//! In-memory implementation of the login-attempt repository.
//!
//! Records live in a concurrent map keyed by id. Two secondary indexes, by
//! identity and by origin, answer the identity-OR-origin query: both id lists
//! are merged and deduplicated before the records are inspected, so an
//! attempt matching on both fields is counted once.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{
    Error,
    attempt::{
        AttemptId, AttemptStats, AttemptSummary, LoginAttempt, NewLoginAttempt, OriginFailures,
    },
    repositories::{LoginAttemptRepository, LoginAttemptRepositoryProvider, RepositoryProvider},
};

/// Login-attempt repository held entirely in process memory.
///
/// Useful for tests and single-process deployments. Nothing survives a
/// restart.
#[derive(Debug, Default)]
pub struct MemoryLoginAttemptRepository {
    records: DashMap<AttemptId, LoginAttempt>,
    by_identity: DashMap<String, Vec<AttemptId>>,
    by_origin: DashMap<String, Vec<AttemptId>>,
    next_id: AtomicI64,
}

impl MemoryLoginAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn matching_ids(&self, identity: &str, origin: &str) -> BTreeSet<AttemptId> {
        let mut ids = BTreeSet::new();
        if let Some(by_identity) = self.by_identity.get(identity) {
            ids.extend(by_identity.iter().copied());
        }
        if let Some(by_origin) = self.by_origin.get(origin) {
            ids.extend(by_origin.iter().copied());
        }
        ids
    }

    /// Remove every record the predicate selects and unlink it from both indexes.
    fn remove_where<F>(&self, mut predicate: F) -> u64
    where
        F: FnMut(&LoginAttempt) -> bool,
    {
        let mut removed = Vec::new();
        self.records.retain(|_, attempt| {
            if predicate(attempt) {
                removed.push((attempt.id, attempt.identity.clone(), attempt.origin.clone()));
                false
            } else {
                true
            }
        });

        for (id, identity, origin) in &removed {
            unlink(&self.by_identity, identity, *id);
            unlink(&self.by_origin, origin, *id);
        }

        removed.len() as u64
    }
}

fn unlink(index: &DashMap<String, Vec<AttemptId>>, key: &str, id: AttemptId) {
    if let Some(mut ids) = index.get_mut(key) {
        ids.retain(|existing| *existing != id);
    }
    index.remove_if(key, |_, ids| ids.is_empty());
}

#[async_trait]
impl LoginAttemptRepository for MemoryLoginAttemptRepository {
    async fn insert(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let id = AttemptId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = LoginAttempt {
            id,
            identity: attempt.identity,
            origin: attempt.origin,
            succeeded: attempt.succeeded,
            occurred_at: attempt.occurred_at,
        };

        // Index entries must exist before the record is visible to cleanup
        self.by_identity
            .entry(record.identity.clone())
            .or_default()
            .push(id);
        self.by_origin
            .entry(record.origin.clone())
            .or_default()
            .push(id);
        self.records.insert(id, record.clone());

        Ok(record)
    }

    async fn failed_stats(
        &self,
        identity: &str,
        origin: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        let mut stats = AttemptStats::default();

        for id in self.matching_ids(identity, origin) {
            let Some(attempt) = self.records.get(&id) else {
                // Deleted by a concurrent cleanup
                continue;
            };
            if attempt.succeeded || attempt.occurred_at < since {
                continue;
            }
            stats.failed_count += 1;
            stats.latest_failed_at = stats.latest_failed_at.max(Some(attempt.occurred_at));
        }

        Ok(stats)
    }

    async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        Ok(self.remove_where(|attempt| attempt.occurred_at < before))
    }

    async fn delete_successful(&self, identity: &str) -> Result<u64, Error> {
        Ok(self.remove_where(|attempt| attempt.succeeded && attempt.identity == identity))
    }

    async fn summary(&self, since: DateTime<Utc>) -> Result<AttemptSummary, Error> {
        let mut summary = AttemptSummary::default();
        let mut identities = HashSet::new();
        let mut origins = HashSet::new();

        for entry in self.records.iter() {
            let attempt = entry.value();
            if attempt.occurred_at < since {
                continue;
            }
            summary.total_attempts += 1;
            if attempt.succeeded {
                summary.successful_attempts += 1;
            } else {
                summary.failed_attempts += 1;
            }
            identities.insert(attempt.identity.clone());
            origins.insert(attempt.origin.clone());
        }

        summary.distinct_identities = identities.len() as u64;
        summary.distinct_origins = origins.len() as u64;
        Ok(summary)
    }

    async fn failures_by_origin(
        &self,
        since: DateTime<Utc>,
        min_failures: u32,
    ) -> Result<Vec<OriginFailures>, Error> {
        let mut per_origin: HashMap<String, (u64, HashSet<String>, DateTime<Utc>)> =
            HashMap::new();

        for entry in self.records.iter() {
            let attempt = entry.value();
            if attempt.succeeded || attempt.occurred_at < since {
                continue;
            }
            let slot = per_origin
                .entry(attempt.origin.clone())
                .or_insert_with(|| (0, HashSet::new(), attempt.occurred_at));
            slot.0 += 1;
            slot.1.insert(attempt.identity.clone());
            slot.2 = slot.2.max(attempt.occurred_at);
        }

        let mut failures: Vec<OriginFailures> = per_origin
            .into_iter()
            .filter(|(_, (count, _, _))| *count >= u64::from(min_failures))
            .map(|(origin, (count, identities, last))| OriginFailures {
                origin,
                failed_attempts: count,
                distinct_identities: identities.len() as u64,
                last_failed_at: last,
            })
            .collect();

        failures.sort_by(|a, b| {
            b.failed_attempts
                .cmp(&a.failed_attempts)
                .then_with(|| a.origin.cmp(&b.origin))
        });
        Ok(failures)
    }
}

/// Repository provider backed by [`MemoryLoginAttemptRepository`].
#[derive(Debug, Default)]
pub struct MemoryRepositoryProvider {
    login_attempt: MemoryLoginAttemptRepository,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoginAttemptRepositoryProvider for MemoryRepositoryProvider {
    type LoginAttemptRepo = MemoryLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn attempt(identity: &str, origin: &str, succeeded: bool, at: DateTime<Utc>) -> NewLoginAttempt {
        NewLoginAttempt {
            identity: identity.to_string(),
            origin: origin.to_string(),
            succeeded,
            occurred_at: at,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let repo = MemoryLoginAttemptRepository::new();
        let now = Utc::now();

        let first = repo.insert(attempt("a@example.com", "1.1.1.1", false, now)).await.unwrap();
        let second = repo.insert(attempt("a@example.com", "1.1.1.1", false, now)).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_stats_counts_each_record_once() {
        let repo = MemoryLoginAttemptRepository::new();
        let now = Utc::now();

        // Matches both identity and origin
        repo.insert(attempt("a@example.com", "1.1.1.1", false, now)).await.unwrap();
        // Matches identity only
        repo.insert(attempt("a@example.com", "2.2.2.2", false, now)).await.unwrap();
        // Matches origin only
        repo.insert(attempt("b@example.com", "1.1.1.1", false, now)).await.unwrap();
        // Matches neither
        repo.insert(attempt("c@example.com", "3.3.3.3", false, now)).await.unwrap();
        // Successful attempts never count
        repo.insert(attempt("a@example.com", "1.1.1.1", true, now)).await.unwrap();

        let stats = repo
            .failed_stats("a@example.com", "1.1.1.1", now - Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 3);
        assert_eq!(stats.latest_failed_at, Some(now));
    }

    #[tokio::test]
    async fn test_failed_stats_respects_since() {
        let repo = MemoryLoginAttemptRepository::new();
        let now = Utc::now();

        repo.insert(attempt("a@example.com", "1.1.1.1", false, now - Duration::minutes(20)))
            .await
            .unwrap();
        repo.insert(attempt("a@example.com", "1.1.1.1", false, now - Duration::minutes(5)))
            .await
            .unwrap();

        let stats = repo
            .failed_stats("a@example.com", "1.1.1.1", now - Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.latest_failed_at, Some(now - Duration::minutes(5)));
    }

    #[tokio::test]
    async fn test_delete_before_unlinks_indexes() {
        let repo = MemoryLoginAttemptRepository::new();
        let now = Utc::now();

        repo.insert(attempt("old@example.com", "1.1.1.1", false, now - Duration::hours(25)))
            .await
            .unwrap();
        repo.insert(attempt("new@example.com", "1.1.1.1", false, now - Duration::hours(23)))
            .await
            .unwrap();

        let deleted = repo.delete_before(now - Duration::hours(24)).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.len(), 1);
        assert!(repo.by_identity.get("old@example.com").is_none());
        assert_eq!(repo.by_origin.get("1.1.1.1").map(|ids| ids.len()), Some(1));

        assert_eq!(repo.delete_before(now - Duration::hours(24)).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cleanup_racing_inserts_leaves_no_stale_index_entries() {
        let repo = std::sync::Arc::new(MemoryLoginAttemptRepository::new());
        let now = Utc::now();
        let old = now - Duration::hours(25);

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..50 {
                    let identity = format!("user{i}-{j}@example.com");
                    let origin = format!("10.0.{i}.{j}");
                    repo.insert(attempt(&identity, &origin, false, old)).await.unwrap();
                }
            }));
        }
        let cleaner = {
            let repo = repo.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    repo.delete_before(now - Duration::hours(24)).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        for handle in handles {
            handle.await.unwrap();
        }
        cleaner.await.unwrap();
        repo.delete_before(now - Duration::hours(24)).await.unwrap();

        assert!(repo.is_empty());
        assert!(repo.by_identity.is_empty());
        assert!(repo.by_origin.is_empty());
    }

    #[tokio::test]
    async fn test_delete_successful_keeps_failures() {
        let repo = MemoryLoginAttemptRepository::new();
        let now = Utc::now();

        repo.insert(attempt("a@example.com", "1.1.1.1", true, now)).await.unwrap();
        repo.insert(attempt("a@example.com", "1.1.1.1", false, now)).await.unwrap();
        repo.insert(attempt("b@example.com", "1.1.1.1", true, now)).await.unwrap();

        let deleted = repo.delete_successful("a@example.com").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.len(), 2);

        let stats = repo
            .failed_stats("a@example.com", "9.9.9.9", now - Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 1);
    }

    #[tokio::test]
    async fn test_summary_and_failures_by_origin() {
        let repo = MemoryLoginAttemptRepository::new();
        let now = Utc::now();

        for identity in ["a@example.com", "b@example.com", "c@example.com"] {
            repo.insert(attempt(identity, "6.6.6.6", false, now)).await.unwrap();
        }
        repo.insert(attempt("a@example.com", "7.7.7.7", false, now)).await.unwrap();
        repo.insert(attempt("a@example.com", "7.7.7.7", true, now)).await.unwrap();
        repo.insert(attempt("z@example.com", "8.8.8.8", false, now - Duration::days(2)))
            .await
            .unwrap();

        let summary = repo.summary(now - Duration::hours(24)).await.unwrap();
        assert_eq!(summary.total_attempts, 5);
        assert_eq!(summary.failed_attempts, 4);
        assert_eq!(summary.successful_attempts, 1);
        assert_eq!(summary.distinct_identities, 3);
        assert_eq!(summary.distinct_origins, 2);

        let failures = repo
            .failures_by_origin(now - Duration::hours(24), 1)
            .await
            .unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].origin, "6.6.6.6");
        assert_eq!(failures[0].failed_attempts, 3);
        assert_eq!(failures[0].distinct_identities, 3);
        assert_eq!(failures[1].origin, "7.7.7.7");

        let alerts = repo
            .failures_by_origin(now - Duration::hours(24), 3)
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_provider_lifecycle() {
        let provider = MemoryRepositoryProvider::new();
        provider.migrate().await.unwrap();
        provider.health_check().await.unwrap();
        assert!(provider.login_attempt().is_empty());
    }
}
