use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Owns the background enrichment tasks spawned after inserts.
///
/// Cloning shares the same tracker and token.
#[derive(Clone, Default)]
pub struct EnrichmentSupervisor {
    tracker: TaskTracker,
    token: CancellationToken,
}

impl EnrichmentSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a tracked task
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    /// Token that is cancelled on shutdown
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Number of tasks still running
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every task spawned so far to finish. New tasks may still be
    /// spawned afterwards, unless shutdown has started.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        if !self.token.is_cancelled() {
            self.tracker.reopen();
        }
    }

    /// Cancel outstanding tasks and wait up to `grace` for them to exit.
    ///
    /// Returns `false` if tasks were still running when the grace period ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.token.cancel();
        self.tracker.close();

        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for enrichment tasks to stop");
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    pending = self.tracker.len(),
                    "Enrichment tasks still running after shutdown grace period"
                );
                false
            }
        }
    }
}
