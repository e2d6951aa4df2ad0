//! # Tollgate
//!
//! Tollgate keeps an append-only ledger of login attempts and decides from
//! it whether an identity and origin pair is locked out. Failures count
//! against a pair when either the identity or the origin matches, so both
//! a single account probed from many addresses and a single address
//! guessing many accounts run into the same limit.
//!
//! With the default [`LockoutPolicy`] a pair is locked after 3 failures in
//! 15 minutes, and records older than 24 hours are purged by
//! [`Tollgate::cleanup`] or the background task started with
//! [`Tollgate::start_cleanup_task`].
//!
//! ## Storage Support
//!
//! - In-memory
//! - SQLite (feature `sqlite`, enabled by default)
//! - Postgres (feature `postgres`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use tollgate::{Admission, TollgateBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tollgate = TollgateBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let guard = tollgate.guard();
//!     match guard.admit("alice@example.com", "203.0.113.7").await {
//!         Admission::Allowed { .. } => { /* verify credentials */ }
//!         Admission::Locked { retry_after_seconds } => {
//!             println!("retry in {retry_after_seconds}s");
//!         }
//!         Admission::Unavailable => { /* deny */ }
//!     }
//!
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};
use tollgate_core::{Clock, SystemClock, repositories::LoginAttemptRepositoryAdapter};

pub mod builder;

pub use builder::{NoStorage, TollgateBuilder, TollgateBuilderError, WithStorage};

pub use tollgate_core::{
    Admission, AttemptId, Error, FailureOutcome, LockoutPolicy, LockoutStatus, LoginAttemptLedger,
    LoginGuard, ManualClock, RepositoryProvider, SecurityReport, error::StorageError,
    repositories::MemoryRepositoryProvider,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use tollgate_storage_sqlite::{SqliteRepositoryProvider, SqliteStorage};

#[cfg(feature = "postgres")]
pub use tollgate_storage_postgres::{PostgresRepositoryProvider, PostgresStorage};

/// The ledger type a [`Tollgate`] drives for a given storage provider.
pub type Ledger<R> = LoginAttemptLedger<LoginAttemptRepositoryAdapter<R>>;

/// Entry point that ties a storage provider to the ledger and its policy.
///
/// Cheap to share: clone the [`LoginGuard`] from [`Tollgate::guard`] into
/// request handlers, or wrap the whole value in an `Arc`.
pub struct Tollgate<R: RepositoryProvider> {
    repositories: Arc<R>,
    ledger: Arc<Ledger<R>>,
}

impl<R: RepositoryProvider> Tollgate<R> {
    /// Create a new instance with the default policy and the system clock.
    pub fn new(repositories: Arc<R>) -> Self {
        Self::from_parts(repositories, LockoutPolicy::default(), Arc::new(SystemClock))
    }

    pub(crate) fn from_parts(
        repositories: Arc<R>,
        policy: LockoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let adapter = Arc::new(LoginAttemptRepositoryAdapter::new(repositories.clone()));
        let ledger = Arc::new(LoginAttemptLedger::with_clock(adapter, policy, clock));

        Self {
            repositories,
            ledger,
        }
    }

    /// Run the storage backend's migrations.
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    pub fn policy(&self) -> &LockoutPolicy {
        self.ledger.policy()
    }

    pub fn ledger(&self) -> &Arc<Ledger<R>> {
        &self.ledger
    }

    /// A guard for an authentication endpoint, sharing this ledger.
    pub fn guard(&self) -> LoginGuard<LoginAttemptRepositoryAdapter<R>> {
        LoginGuard::new(Arc::clone(&self.ledger))
    }

    pub async fn lockout_status(&self, identity: &str, origin: &str) -> Result<LockoutStatus, Error> {
        self.ledger.lockout_status(identity, origin).await
    }

    /// Purge records older than the retention period.
    pub async fn cleanup(&self) -> Result<u64, Error> {
        self.ledger.cleanup().await
    }

    pub async fn clear_successful(&self, identity: &str) -> Result<u64, Error> {
        self.ledger.clear_successful(identity).await
    }

    pub async fn security_report(&self) -> Result<SecurityReport, Error> {
        self.ledger.security_report().await
    }

    /// Run [`Tollgate::cleanup`] every `cleanup_interval` of the policy until
    /// `shutdown` fires.
    pub fn start_cleanup_task(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.ledger.start_cleanup_task(shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_uses_default_policy() {
        let tollgate = Tollgate::new(Arc::new(MemoryRepositoryProvider::new()));

        assert_eq!(tollgate.policy(), &LockoutPolicy::default());
        tollgate.migrate().await.unwrap();
        tollgate.health_check().await.unwrap();

        let status = tollgate
            .lockout_status("alice@example.com", "203.0.113.7")
            .await
            .unwrap();
        assert!(!status.is_locked);
        assert_eq!(status.remaining_attempts, 3);
    }

    #[tokio::test]
    async fn test_guards_share_one_ledger() {
        let tollgate = Tollgate::new(Arc::new(MemoryRepositoryProvider::new()));

        let first = tollgate.guard();
        let second = tollgate.guard();
        first
            .record_failure("alice@example.com", "203.0.113.7")
            .await
            .unwrap();

        assert_eq!(
            second.admit("alice@example.com", "203.0.113.7").await,
            Admission::Allowed {
                remaining_attempts: 2
            }
        );
    }
}
