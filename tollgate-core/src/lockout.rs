//! Lockout state and the security report derived from the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attempt::{AttemptSummary, OriginFailures};

/// Lockout state of an identity/origin pair at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutStatus {
    pub identity: String,
    pub origin: String,
    /// Failures inside the lockout window matching identity OR origin.
    pub failed_attempts: u32,
    /// Failures left before the pair locks; 0 once locked.
    pub remaining_attempts: u32,
    pub is_locked: bool,
    /// When the most recent failure ages out of the window. `None` if open.
    pub locked_until: Option<DateTime<Utc>>,
    /// The instant this status was computed at.
    pub checked_at: DateTime<Utc>,
}

impl LockoutStatus {
    /// A status for a pair with no counted failures.
    pub fn open(identity: &str, origin: &str, remaining_attempts: u32, now: DateTime<Utc>) -> Self {
        Self {
            identity: identity.to_string(),
            origin: origin.to_string(),
            failed_attempts: 0,
            remaining_attempts,
            is_locked: false,
            locked_until: None,
            checked_at: now,
        }
    }

    /// Seconds until the lockout lifts, rounded up. `None` if not locked.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        self.locked_until.map(|until| seconds_until(self.checked_at, until))
    }
}

/// Whole seconds from `now` until `until`, rounded up and never negative.
pub(crate) fn seconds_until(now: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    let millis = (until - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis + 999) / 1000
    }
}

/// Aggregate numbers for the security dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityMetrics {
    #[serde(flatten)]
    pub last_24h: AttemptSummary,
    /// Origins currently at or over the failure threshold.
    pub blocked_origins: u64,
}

/// Snapshot of recent ledger activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub generated_at: DateTime<Utc>,
    pub metrics: SecurityMetrics,
    /// Origins with at least the threshold of failures in the reporting
    /// period, busiest first.
    pub alerts: Vec<OriginFailures>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_seconds_until_rounds_up() {
        let now = Utc::now();
        assert_eq!(seconds_until(now, now + Duration::milliseconds(1)), 1);
        assert_eq!(seconds_until(now, now + Duration::seconds(840)), 840);
        assert_eq!(seconds_until(now, now + Duration::milliseconds(840_001)), 841);
    }

    #[test]
    fn test_seconds_until_never_negative() {
        let now = Utc::now();
        assert_eq!(seconds_until(now, now), 0);
        assert_eq!(seconds_until(now, now - Duration::minutes(3)), 0);
    }

    #[test]
    fn test_open_status_has_no_retry_after() {
        let status = LockoutStatus::open("eve@example.com", "10.0.0.5", 3, Utc::now());
        assert!(!status.is_locked);
        assert_eq!(status.retry_after_seconds(), None);
    }

    #[test]
    fn test_metrics_serialize_flat() {
        let metrics = SecurityMetrics {
            last_24h: AttemptSummary {
                total_attempts: 4,
                failed_attempts: 3,
                successful_attempts: 1,
                distinct_identities: 2,
                distinct_origins: 1,
            },
            blocked_origins: 1,
        };
        let value = serde_json::to_value(metrics).unwrap();
        assert_eq!(value["total_attempts"], 4);
        assert_eq!(value["failed_attempts"], 3);
        assert_eq!(value["blocked_origins"], 1);
    }
}
