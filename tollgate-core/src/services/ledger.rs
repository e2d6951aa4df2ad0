//! Login-attempt ledger and lockout policy.
//!
//! Every authentication attempt is appended to the ledger. Whether an
//! identity/origin pair is locked out is never stored: it is recomputed on
//! each read from the failures inside a sliding window that ends at the
//! current instant.
//!
//! # Lockout rules
//!
//! - A failure counts toward a pair when it matches the identity OR the
//!   origin. Rotating emails from one address, or spreading one email
//!   across many addresses, draws from the same budget.
//! - The pair is locked while at least `max_failed_attempts` such failures
//!   lie within the last `lockout_period`.
//! - A lockout lifts `lockout_period` after the most recent counted
//!   failure, with no explicit unlock.
//! - Successful attempts do not reset the count; failures only age out.
//!
//! # Example
//!
//! ```rust,ignore
//! use tollgate_core::services::LoginAttemptLedger;
//! use tollgate_core::LockoutPolicy;
//!
//! let ledger = LoginAttemptLedger::new(repository, LockoutPolicy::default());
//!
//! if ledger.is_blocked("eve@example.com", "10.0.0.5").await? {
//!     let retry_after = ledger
//!         .remaining_lockout_seconds("eve@example.com", "10.0.0.5")
//!         .await?;
//!     // Reject with a retry-after hint
//! }
//!
//! ledger.record("eve@example.com", "10.0.0.5", false).await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    Error,
    attempt::{AttemptId, AttemptStats, NewLoginAttempt, normalize_identity},
    clock::{Clock, SystemClock},
    lockout::{LockoutStatus, SecurityMetrics, SecurityReport},
    policy::LockoutPolicy,
    repositories::LoginAttemptRepository,
};

/// Period covered by [`LoginAttemptLedger::security_report`].
const REPORT_PERIOD_HOURS: i64 = 24;

/// Service that records login attempts and decides lockouts.
///
/// # Thread Safety
///
/// The ledger holds no mutable state of its own and can be shared across
/// tasks behind an `Arc`. All coordination is left to the repository.
pub struct LoginAttemptLedger<R: LoginAttemptRepository> {
    repository: Arc<R>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl<R: LoginAttemptRepository> LoginAttemptLedger<R> {
    /// Create a ledger that reads time from the system clock.
    pub fn new(repository: Arc<R>, policy: LockoutPolicy) -> Self {
        Self::with_clock(repository, policy, Arc::new(SystemClock))
    }

    /// Create a ledger with an injected time source.
    pub fn with_clock(repository: Arc<R>, policy: LockoutPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.policy.enabled
    }

    /// The current instant according to the ledger's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Append an attempt to the ledger.
    ///
    /// The identity is normalized to lower case and the timestamp is taken
    /// from the ledger's clock. Attempts are recorded even when the policy
    /// is disabled.
    pub async fn record(
        &self,
        identity: &str,
        origin: &str,
        succeeded: bool,
    ) -> Result<AttemptId, Error> {
        let attempt = self
            .repository
            .insert(NewLoginAttempt {
                identity: normalize_identity(identity),
                origin: origin.to_string(),
                succeeded,
                occurred_at: self.clock.now(),
            })
            .await?;

        tracing::debug!(
            id = %attempt.id,
            identity = %attempt.identity,
            origin = %attempt.origin,
            succeeded,
            "Recorded login attempt"
        );

        Ok(attempt.id)
    }

    /// Failed attempts matching the identity OR the origin within the
    /// lockout window.
    pub async fn recent_failed_attempts(&self, identity: &str, origin: &str) -> Result<u32, Error> {
        let now = self.clock.now();
        Ok(self.window_stats(identity, origin, now).await?.failed_count)
    }

    /// Whether the pair has reached the failure threshold.
    pub async fn is_blocked(&self, identity: &str, origin: &str) -> Result<bool, Error> {
        Ok(self.lockout_status(identity, origin).await?.is_locked)
    }

    /// Seconds until the current lockout lifts, or 0 when the pair is open.
    ///
    /// The countdown runs from the most recent counted failure, so every
    /// failure recorded during a lockout pushes the unlock time back.
    pub async fn remaining_lockout_seconds(
        &self,
        identity: &str,
        origin: &str,
    ) -> Result<i64, Error> {
        let status = self.lockout_status(identity, origin).await?;
        Ok(status.retry_after_seconds().unwrap_or(0))
    }

    /// Full lockout state of a pair, computed from a single aggregate query.
    pub async fn lockout_status(&self, identity: &str, origin: &str) -> Result<LockoutStatus, Error> {
        let now = self.clock.now();

        if !self.policy.enabled {
            return Ok(LockoutStatus::open(
                identity,
                origin,
                self.policy.max_failed_attempts,
                now,
            ));
        }

        let stats = self.window_stats(identity, origin, now).await?;
        Ok(self.compute_lockout_status(identity, origin, &stats, now))
    }

    /// Delete records older than the retention period, whatever their
    /// outcome. Returns the number of records deleted.
    pub async fn cleanup(&self) -> Result<u64, Error> {
        let before = self.clock.now() - self.policy.retention_period;
        let deleted = self.repository.delete_before(before).await?;

        tracing::debug!(deleted, before = %before, "Purged expired login attempts");
        Ok(deleted)
    }

    /// Delete the successful attempts of an identity.
    ///
    /// Failed attempts are left in place: they are what lockouts are
    /// computed from.
    pub async fn clear_successful(&self, identity: &str) -> Result<u64, Error> {
        let identity = normalize_identity(identity);
        let deleted = self.repository.delete_successful(&identity).await?;

        tracing::debug!(identity = %identity, deleted, "Cleared successful login attempts");
        Ok(deleted)
    }

    /// Snapshot of the last 24 hours of activity.
    pub async fn security_report(&self) -> Result<SecurityReport, Error> {
        let now = self.clock.now();
        let period_start = now - Duration::hours(REPORT_PERIOD_HOURS);

        let last_24h = self.repository.summary(period_start).await?;
        let blocked_origins = self
            .repository
            .failures_by_origin(now - self.policy.lockout_period, self.policy.max_failed_attempts)
            .await?
            .len() as u64;
        let alerts = self
            .repository
            .failures_by_origin(period_start, self.policy.max_failed_attempts)
            .await?;

        Ok(SecurityReport {
            generated_at: now,
            metrics: SecurityMetrics {
                last_24h,
                blocked_origins,
            },
            alerts,
        })
    }

    async fn window_stats(
        &self,
        identity: &str,
        origin: &str,
        now: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        if !self.policy.enabled {
            return Ok(AttemptStats::default());
        }

        self.repository
            .failed_stats(
                &normalize_identity(identity),
                origin,
                now - self.policy.lockout_period,
            )
            .await
    }

    fn compute_lockout_status(
        &self,
        identity: &str,
        origin: &str,
        stats: &AttemptStats,
        now: DateTime<Utc>,
    ) -> LockoutStatus {
        let max = self.policy.max_failed_attempts;

        // Not enough failures to trigger lockout
        if stats.failed_count < max {
            return LockoutStatus {
                failed_attempts: stats.failed_count,
                remaining_attempts: max - stats.failed_count,
                ..LockoutStatus::open(identity, origin, max, now)
            };
        }

        // Locked while the windowed count holds; the countdown may read 0
        let locked_until = stats
            .latest_failed_at
            .map(|latest| latest + self.policy.lockout_period);

        LockoutStatus {
            identity: identity.to_string(),
            origin: origin.to_string(),
            failed_attempts: stats.failed_count,
            remaining_attempts: 0,
            is_locked: true,
            locked_until,
            checked_at: now,
        }
    }
}
