//! Repository traits for the data access layer
//!
//! The services in this crate reach storage only through these traits:
//!
//! - [`LoginAttemptRepository`] defines the ledger operations
//! - [`LoginAttemptRepositoryProvider`] gives access to a backend's repository
//! - [`RepositoryProvider`] adds lifecycle methods for migrations and health checks
//!
//! [`LoginAttemptRepositoryAdapter`] turns any provider back into a plain
//! repository so services can hold it directly.

pub mod adapter;
pub mod login_attempt;
pub mod memory;

pub use adapter::LoginAttemptRepositoryAdapter;
pub use login_attempt::LoginAttemptRepository;
pub use memory::{MemoryLoginAttemptRepository, MemoryRepositoryProvider};

use async_trait::async_trait;

use crate::Error;

/// Provider trait for login-attempt repository access.
pub trait LoginAttemptRepositoryProvider: Send + Sync + 'static {
    /// The login-attempt repository implementation type
    type LoginAttemptRepo: LoginAttemptRepository;

    /// Get the login-attempt repository
    fn login_attempt(&self) -> &Self::LoginAttemptRepo;
}

/// Provider trait that storage backends implement.
///
/// # Example
///
/// ```rust,ignore
/// use tollgate_core::repositories::*;
///
/// struct MyStorage { attempts: MyLoginAttemptRepository }
///
/// impl LoginAttemptRepositoryProvider for MyStorage {
///     type LoginAttemptRepo = MyLoginAttemptRepository;
///     fn login_attempt(&self) -> &Self::LoginAttemptRepo { &self.attempts }
/// }
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: LoginAttemptRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
