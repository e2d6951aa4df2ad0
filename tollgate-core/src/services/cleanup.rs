//! Scheduled retention cleanup for the ledger.

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};

use crate::{repositories::LoginAttemptRepository, services::LoginAttemptLedger};

/// Spawn a task that calls [`LoginAttemptLedger::cleanup`] every `interval`.
///
/// The first run happens immediately. The task stops when `shutdown`
/// changes or its sender is dropped. Failed runs are logged and retried on
/// the next tick.
pub fn spawn_cleanup_task<R: LoginAttemptRepository>(
    ledger: Arc<LoginAttemptLedger<R>>,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    match ledger.cleanup().await {
                        Ok(count) if count > 0 => {
                            tracing::info!(
                                count = count,
                                "Cleaned up expired login attempt records"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                "Failed to cleanup login attempt records"
                            );
                        }
                        _ => {}
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Shutting down login attempt cleanup task");
                    break;
                }
            }
        }
    })
}

impl<R: LoginAttemptRepository> LoginAttemptLedger<R> {
    /// Start the background cleanup task at the policy's cleanup interval.
    pub fn start_cleanup_task(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        spawn_cleanup_task(Arc::clone(self), self.policy().cleanup_interval, shutdown)
    }
}
