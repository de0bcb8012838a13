//! Stop coordination between a receive loop and whoever stops it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Signals a loop to stop and waits, bounded, for it to report completion.
///
/// Clones share state: one side calls [`initiate_shutdown`] and
/// [`wait_for_completion`], the loop side selects on [`subscribe`] and calls
/// [`mark_complete`] when it has left.
///
/// [`initiate_shutdown`]: ShutdownController::initiate_shutdown
/// [`wait_for_completion`]: ShutdownController::wait_for_completion
/// [`subscribe`]: ShutdownController::subscribe
/// [`mark_complete`]: ShutdownController::mark_complete
#[derive(Debug, Clone)]
pub struct ShutdownController {
    name: Arc<str>,
    initiated: Arc<AtomicBool>,
    signal_tx: broadcast::Sender<()>,
    completion_tx: Arc<watch::Sender<bool>>,
}

impl ShutdownController {
    /// Creates a controller; `name` appears in its log lines.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let (signal_tx, _) = broadcast::channel(1);
        Self {
            name: Arc::from(name.into()),
            initiated: Arc::new(AtomicBool::new(false)),
            signal_tx,
            completion_tx: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Signals shutdown. Only the first call has any effect.
    pub fn initiate_shutdown(&self) -> bool {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        debug!(name = %self.name, "Shutdown initiated");
        // No subscribers is fine: loops check the flag before subscribing.
        let _ = self.signal_tx.send(());
        true
    }

    /// Returns true once shutdown was signalled.
    #[must_use]
    pub fn is_shutdown_initiated(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Receiver that yields once shutdown is signalled.
    ///
    /// Subscribe before checking [`is_shutdown_initiated`](Self::is_shutdown_initiated)
    /// so that a signal sent in between is not missed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.signal_tx.subscribe()
    }

    /// Resolves once shutdown is signalled, immediately if it already was.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.subscribe();
        if self.is_shutdown_initiated() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Reports that the stopped loop has exited.
    pub fn mark_complete(&self) {
        self.completion_tx.send_replace(true);
    }

    /// Returns true once [`mark_complete`](Self::mark_complete) was called.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        *self.completion_tx.borrow()
    }

    /// Waits up to `timeout` for completion. Returns false on timeout.
    pub async fn wait_for_completion(&self, timeout: Duration) -> bool {
        let mut rx = self.completion_tx.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|done| *done)).await {
            Ok(result) => result.is_ok(),
            Err(_) => {
                warn!(name = %self.name, ?timeout, "Timed out waiting for shutdown to complete");
                false
            }
        }
    }
}
