//! Lockout policy configuration.

use chrono::Duration;

use crate::Error;

/// Failed attempts allowed inside the lockout window before blocking.
pub const MAX_ATTEMPTS: u32 = 3;

/// Length of the sliding window, and of the lockout it produces.
pub const LOCKOUT_MINUTES: i64 = 15;

/// Age after which records are purged by cleanup.
pub const RETENTION_HOURS: i64 = 24;

/// How often the background cleanup task runs by default.
pub const DEFAULT_CLEANUP_INTERVAL: std::time::Duration =
    std::time::Duration::from_secs(24 * 60 * 60);

/// Configuration for the login-attempt ledger.
///
/// # Example
///
/// ```rust
/// use chrono::Duration;
/// use tollgate_core::LockoutPolicy;
///
/// let policy = LockoutPolicy {
///     max_failed_attempts: 5,
///     lockout_period: Duration::minutes(30),
///     ..Default::default()
/// };
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// When false, the ledger still records attempts but never reports a lockout.
    pub enabled: bool,
    /// Failures within `lockout_period` that block an identity/origin pair.
    pub max_failed_attempts: u32,
    /// Sliding window over which failures are counted, measured back from now.
    pub lockout_period: Duration,
    /// Records older than this are removed by `cleanup()`.
    pub retention_period: Duration,
    /// Period of the background cleanup task.
    pub cleanup_interval: std::time::Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failed_attempts: MAX_ATTEMPTS,
            lockout_period: Duration::minutes(LOCKOUT_MINUTES),
            retention_period: Duration::hours(RETENTION_HOURS),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl LockoutPolicy {
    /// A policy that records attempts but never locks anyone out.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Load a policy from `TOLLGATE_*` environment variables.
    ///
    /// Unset variables fall back to the defaults. Recognised variables:
    ///
    /// - `TOLLGATE_LOCKOUT_ENABLED` (`true`/`false`)
    /// - `TOLLGATE_MAX_FAILED_ATTEMPTS`
    /// - `TOLLGATE_LOCKOUT_MINUTES`
    /// - `TOLLGATE_RETENTION_HOURS`
    /// - `TOLLGATE_CLEANUP_INTERVAL_SECS`
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Self::default();

        let policy = Self {
            enabled: env_parse("TOLLGATE_LOCKOUT_ENABLED")?.unwrap_or(defaults.enabled),
            max_failed_attempts: env_parse("TOLLGATE_MAX_FAILED_ATTEMPTS")?
                .unwrap_or(defaults.max_failed_attempts),
            lockout_period: env_parse("TOLLGATE_LOCKOUT_MINUTES")?
                .map(Duration::minutes)
                .unwrap_or(defaults.lockout_period),
            retention_period: env_parse("TOLLGATE_RETENTION_HOURS")?
                .map(Duration::hours)
                .unwrap_or(defaults.retention_period),
            cleanup_interval: env_parse("TOLLGATE_CLEANUP_INTERVAL_SECS")?
                .map(std::time::Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
        };

        policy.validate()?;
        Ok(policy)
    }

    /// Reject policies that cannot produce a meaningful lockout.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_failed_attempts == 0 {
            return Err(Error::Configuration(
                "max_failed_attempts must be at least 1".to_string(),
            ));
        }
        if self.lockout_period <= Duration::zero() {
            return Err(Error::Configuration(
                "lockout_period must be positive".to_string(),
            ));
        }
        // Cleanup must never delete failures that still count toward a lockout
        if self.retention_period < self.lockout_period {
            return Err(Error::Configuration(
                "retention_period must not be shorter than lockout_period".to_string(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(Error::Configuration(
                "cleanup_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, Error> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Configuration(format!("{key} has an invalid value: {value}"))),
        Err(_) => Ok(None),
    }
}
