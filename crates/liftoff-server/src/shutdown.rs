//! Graceful shutdown: one `CancellationToken` shared by the listener, the
//! coordinator and every connection.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long to wait for named tasks when the caller gives no timeout.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the server-wide cancellation token.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator whose token is not yet cancelled.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Clone of the server-wide token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then give each named task until `timeout` (shared deadline)
    /// to finish. Stragglers are aborted and their names returned.
    pub async fn graceful_shutdown(
        &self,
        tasks: Vec<(&'static str, JoinHandle<()>)>,
        timeout: Option<Duration>,
    ) -> Vec<&'static str> {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();
        info!(
            tasks = tasks.len(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining server tasks"
        );

        let deadline = tokio::time::Instant::now() + timeout;
        let mut aborted = Vec::new();
        for (name, mut handle) in tasks {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = name, error = %e, "task ended abnormally"),
                Err(_) => {
                    handle.abort();
                    warn!(task = name, "task did not stop in time, aborted");
                    aborted.push(name);
                }
            }
        }
        aborted
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        assert!(!ShutdownCoordinator::new().is_shutting_down());
    }

    #[test]
    fn shutdown_is_idempotent_and_reaches_clones() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let child = token.child_token();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(token.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn cooperative_tasks_drain_cleanly() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let listener = tokio::spawn(async move { token.cancelled().await });
        let idle = tokio::spawn(async {});

        let aborted = coord
            .graceful_shutdown(vec![("listener", listener), ("idle", idle)], None)
            .await;
        assert!(aborted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_task_is_aborted_and_named() {
        let coord = ShutdownCoordinator::new();
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });
        let token = coord.token();
        let polite = tokio::spawn(async move { token.cancelled().await });

        let aborted = coord
            .graceful_shutdown(
                vec![("stuck", stuck), ("polite", polite)],
                Some(Duration::from_millis(100)),
            )
            .await;
        assert_eq!(aborted, ["stuck"]);
    }
}
