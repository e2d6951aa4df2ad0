//! Service layer for business logic
//!
//! This module contains the services that sit on top of the repository
//! traits: the ledger itself, the authentication-side guard, and the
//! scheduled cleanup task.

pub mod cleanup;
pub mod guard;
pub mod ledger;

pub use cleanup::spawn_cleanup_task;
pub use guard::{Admission, FailureOutcome, LoginGuard};
pub use ledger::LoginAttemptLedger;
