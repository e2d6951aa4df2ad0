//! Repository trait for the login-attempt ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    attempt::{AttemptStats, AttemptSummary, LoginAttempt, NewLoginAttempt, OriginFailures},
};

/// Storage operations behind the login-attempt ledger.
///
/// The ledger is append-only: implementations insert records and delete them
/// in bulk, but never update one. None of these operations needs a
/// transaction; concurrent inserts are independent and the aggregate reads
/// tolerate racing writers.
///
/// # Identity OR origin
///
/// [`failed_stats`](Self::failed_stats) matches a record when its identity
/// equals the given identity *or* its origin equals the given origin. A
/// relational backend expresses this as one predicate; other backends
/// should merge per-field indexes and count each record once.
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Append a record and return it with its assigned id.
    async fn insert(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error>;

    /// Count failed attempts matching `identity` OR `origin` at or after
    /// `since`, together with the newest such attempt's timestamp.
    async fn failed_stats(
        &self,
        identity: &str,
        origin: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error>;

    /// Delete every record that occurred strictly before `before`.
    ///
    /// Returns the number of records deleted.
    async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64, Error>;

    /// Delete the successful records of an identity. Failed records stay.
    ///
    /// Returns the number of records deleted.
    async fn delete_successful(&self, identity: &str) -> Result<u64, Error>;

    /// Totals over records at or after `since`.
    async fn summary(&self, since: DateTime<Utc>) -> Result<AttemptSummary, Error>;

    /// Origins with at least `min_failures` failed attempts at or after
    /// `since`, ordered by failures descending, then origin ascending.
    async fn failures_by_origin(
        &self,
        since: DateTime<Utc>,
        min_failures: u32,
    ) -> Result<Vec<OriginFailures>, Error>;
}
