//! Authentication-side wrapper around the ledger.
//!
//! [`LoginGuard`] encodes the calling sequence an authentication endpoint
//! follows: check the pair before verifying credentials, then record the
//! outcome. It composes no user-facing text; callers build messages from
//! the numbers it returns.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Error, attempt::AttemptId, repositories::LoginAttemptRepository,
    services::LoginAttemptLedger,
};

/// Result of the pre-authentication check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Admission {
    /// Credentials may be verified.
    Allowed { remaining_attempts: u32 },
    /// Too many recent failures. Respond with a rate-limit signal.
    Locked { retry_after_seconds: i64 },
    /// The ledger could not be read. The attempt is denied.
    Unavailable,
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }

    /// Retry-after hint for a rate-limited response.
    pub fn retry_after(&self) -> Option<i64> {
        match self {
            Admission::Locked {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

/// What a failed credential check leaves the pair with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FailureOutcome {
    /// Further attempts are allowed.
    RemainingAttempts { remaining: u32 },
    /// This failure reached the threshold.
    Locked { retry_after_seconds: i64 },
}

/// Gatekeeper for an authentication endpoint.
pub struct LoginGuard<R: LoginAttemptRepository> {
    ledger: Arc<LoginAttemptLedger<R>>,
}

impl<R: LoginAttemptRepository> Clone for LoginGuard<R> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<R: LoginAttemptRepository> LoginGuard<R> {
    pub fn new(ledger: Arc<LoginAttemptLedger<R>>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &LoginAttemptLedger<R> {
        &self.ledger
    }

    /// Decide whether credentials may be checked for this pair.
    ///
    /// Storage failures are logged and fail closed as
    /// [`Admission::Unavailable`] rather than skipping the lockout check.
    pub async fn admit(&self, identity: &str, origin: &str) -> Admission {
        match self.ledger.lockout_status(identity, origin).await {
            Ok(status) if status.is_locked => {
                let retry_after_seconds = status.retry_after_seconds().unwrap_or(0);
                tracing::info!(
                    identity = %status.identity,
                    origin = %origin,
                    failed_attempts = status.failed_attempts,
                    retry_after_seconds,
                    "Rejected login attempt during lockout"
                );
                Admission::Locked {
                    retry_after_seconds,
                }
            }
            Ok(status) => Admission::Allowed {
                remaining_attempts: status.remaining_attempts,
            },
            Err(e) => {
                tracing::error!(
                    error = %e,
                    origin = %origin,
                    "Failed to read login attempt ledger, denying attempt"
                );
                Admission::Unavailable
            }
        }
    }

    /// Record a failed credential check and report what is left.
    pub async fn record_failure(&self, identity: &str, origin: &str) -> Result<FailureOutcome, Error> {
        self.ledger.record(identity, origin, false).await?;

        let status = self.ledger.lockout_status(identity, origin).await?;
        let remaining =
            i64::from(self.ledger.policy().max_failed_attempts) - i64::from(status.failed_attempts);

        if remaining > 0 {
            return Ok(FailureOutcome::RemainingAttempts {
                remaining: remaining as u32,
            });
        }

        let retry_after_seconds = status.retry_after_seconds().unwrap_or(0);
        tracing::warn!(
            identity = %status.identity,
            origin = %origin,
            failed_attempts = status.failed_attempts,
            retry_after_seconds,
            "Login attempts locked out"
        );
        Ok(FailureOutcome::Locked {
            retry_after_seconds,
        })
    }

    /// Record a successful credential check.
    ///
    /// Earlier failures stay in the ledger and keep counting until they age
    /// out of the lockout window.
    pub async fn record_success(&self, identity: &str, origin: &str) -> Result<AttemptId, Error> {
        self.ledger.record(identity, origin, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        LockoutPolicy,
        attempt::{AttemptStats, AttemptSummary, LoginAttempt, NewLoginAttempt, OriginFailures},
        clock::ManualClock,
        error::StorageError,
        repositories::MemoryLoginAttemptRepository,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    fn guard() -> (LoginGuard<MemoryLoginAttemptRepository>, ManualClock) {
        let clock = ManualClock::starting_now();
        let ledger = LoginAttemptLedger::with_clock(
            Arc::new(MemoryLoginAttemptRepository::new()),
            LockoutPolicy::default(),
            Arc::new(clock.clone()),
        );
        (LoginGuard::new(Arc::new(ledger)), clock)
    }

    #[tokio::test]
    async fn test_failure_sequence_counts_down_then_locks() {
        let (guard, _clock) = guard();

        assert_eq!(
            guard.admit("eve@example.com", "10.0.0.5").await,
            Admission::Allowed {
                remaining_attempts: 3
            }
        );

        assert_eq!(
            guard.record_failure("eve@example.com", "10.0.0.5").await.unwrap(),
            FailureOutcome::RemainingAttempts { remaining: 2 }
        );
        assert_eq!(
            guard.record_failure("eve@example.com", "10.0.0.5").await.unwrap(),
            FailureOutcome::RemainingAttempts { remaining: 1 }
        );
        assert_eq!(
            guard.record_failure("eve@example.com", "10.0.0.5").await.unwrap(),
            FailureOutcome::Locked {
                retry_after_seconds: 900
            }
        );

        let admission = guard.admit("eve@example.com", "10.0.0.5").await;
        assert!(!admission.is_allowed());
        assert_eq!(admission.retry_after(), Some(900));
    }

    #[tokio::test]
    async fn test_lockout_expires() {
        let (guard, clock) = guard();

        for _ in 0..3 {
            guard.record_failure("eve@example.com", "10.0.0.5").await.unwrap();
        }
        clock.advance(Duration::minutes(16));

        assert!(guard.admit("eve@example.com", "10.0.0.5").await.is_allowed());
    }

    #[tokio::test]
    async fn test_success_is_recorded() {
        let (guard, _clock) = guard();

        guard.record_failure("eve@example.com", "10.0.0.5").await.unwrap();
        guard.record_success("eve@example.com", "10.0.0.5").await.unwrap();

        assert_eq!(
            guard.admit("eve@example.com", "10.0.0.5").await,
            Admission::Allowed {
                remaining_attempts: 2
            }
        );
    }

    struct BrokenRepository;

    #[async_trait]
    impl LoginAttemptRepository for BrokenRepository {
        async fn insert(&self, _attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
            Err(StorageError::Database("write failed".to_string()).into())
        }

        async fn failed_stats(
            &self,
            _identity: &str,
            _origin: &str,
            _since: DateTime<Utc>,
        ) -> Result<AttemptStats, Error> {
            Err(StorageError::Connection("connection lost".to_string()).into())
        }

        async fn delete_before(&self, _before: DateTime<Utc>) -> Result<u64, Error> {
            Ok(0)
        }

        async fn delete_successful(&self, _identity: &str) -> Result<u64, Error> {
            Ok(0)
        }

        async fn summary(&self, _since: DateTime<Utc>) -> Result<AttemptSummary, Error> {
            Ok(AttemptSummary::default())
        }

        async fn failures_by_origin(
            &self,
            _since: DateTime<Utc>,
            _min_failures: u32,
        ) -> Result<Vec<OriginFailures>, Error> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_storage_failure_fails_closed() {
        let ledger = LoginAttemptLedger::new(Arc::new(BrokenRepository), LockoutPolicy::default());
        let guard = LoginGuard::new(Arc::new(ledger));

        let admission = guard.admit("eve@example.com", "10.0.0.5").await;
        assert_eq!(admission, Admission::Unavailable);
        assert!(!admission.is_allowed());
        assert_eq!(admission.retry_after(), None);

        assert!(guard.record_failure("eve@example.com", "10.0.0.5").await.is_err());
        assert!(guard.record_success("eve@example.com", "10.0.0.5").await.is_err());
    }

    #[test]
    fn test_admission_serialization() {
        let json = serde_json::to_value(Admission::Locked {
            retry_after_seconds: 840,
        })
        .unwrap();
        assert_eq!(json["status"], "locked");
        assert_eq!(json["retry_after_seconds"], 840);
    }
}
