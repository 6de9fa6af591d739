//! Process shutdown: one root token for the listener, a child for the
//! dispatcher.
//!
//! Cancelling the root stops `axum::serve` from accepting upgrades and, via
//! the child, makes the dispatcher close every registered connection. Each
//! session then sees its teardown token fire, unregisters, and flushes its
//! write pump before the socket is closed.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Used when the caller does not configure a drain timeout.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the root cancellation token of a running server.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Fresh, uncancelled coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Root token, cancelled by [`shutdown`](Self::shutdown).
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Token the dispatcher runs on.
    ///
    /// A child of the root: it fires on shutdown, and cancelling it alone
    /// stops the hub without touching the listener.
    pub fn hub_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Cancel the root token. Idempotent.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("shutdown requested");
        }
        self.token.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait up to `timeout` for the listener and dispatcher
    /// tasks to return.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();
        info!(
            task_count = handles.len(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining server tasks"
        );

        if tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(?timeout, "drain timed out, abandoning remaining tasks");
        }
    }
}
