//! Core functionality for the tollgate project
//!
//! This crate contains the login-attempt ledger and the lockout policy
//! computed from it, together with the repository traits storage backends
//! implement.
//!
//! See [`services::LoginAttemptLedger`] for the ledger, [`services::LoginGuard`]
//! for the calling sequence of an authentication endpoint, and
//! [`repositories::RepositoryProvider`] for the storage interface.
pub mod attempt;
pub mod clock;
pub mod error;
pub mod lockout;
pub mod policy;
pub mod repositories;
pub mod services;

pub use attempt::{
    AttemptId, AttemptStats, AttemptSummary, LoginAttempt, NewLoginAttempt, OriginFailures,
    normalize_identity,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use lockout::{LockoutStatus, SecurityMetrics, SecurityReport};
pub use policy::{LOCKOUT_MINUTES, LockoutPolicy, MAX_ATTEMPTS, RETENTION_HOURS};
pub use repositories::{LoginAttemptRepository, RepositoryProvider};
pub use services::{Admission, FailureOutcome, LoginAttemptLedger, LoginGuard};
