//! Ledger records and the aggregates storage backends return.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage-assigned identifier of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(i64);

impl AttemptId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for AttemptId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One authentication attempt, as stored in the ledger.
///
/// Records are immutable once written. Identical identity, origin and
/// timestamp values are distinct rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub id: AttemptId,
    /// Normalized account identifier (lower-cased email).
    pub identity: String,
    /// Network origin of the attempt, usually an IP address.
    pub origin: String,
    pub succeeded: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Insert payload handed to storage by the ledger.
///
/// `occurred_at` is filled from the ledger's clock, never from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoginAttempt {
    pub identity: String,
    pub origin: String,
    pub succeeded: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Failed attempts matching an identity OR an origin since a cutoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptStats {
    pub failed_count: u32,
    pub latest_failed_at: Option<DateTime<Utc>>,
}

/// Ledger totals since a cutoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub total_attempts: u64,
    pub failed_attempts: u64,
    pub successful_attempts: u64,
    pub distinct_identities: u64,
    pub distinct_origins: u64,
}

/// Failures from a single origin since a cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginFailures {
    pub origin: String,
    pub failed_attempts: u64,
    pub distinct_identities: u64,
    pub last_failed_at: DateTime<Utc>,
}

/// Normalize an account identifier before it touches storage.
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}
