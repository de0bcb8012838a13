//! Receive loop and send path over a pair of router sockets.

use async_trait::async_trait;
use parking_lot::Mutex;
use sirocco_core::error::NetworkError;
use sirocco_core::identifiers::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::shutdown::ShutdownController;
use crate::transport::{Multipart, RouterSocket};

/// Consumer of inbound multipart payloads.
///
/// Payloads are handed over one at a time, in arrival order.
#[async_trait]
pub trait PayloadHandler: Send + Sync + 'static {
    /// Handles one payload, `[sender identity, frames...]`.
    async fn handle_payload(&self, frames: Multipart);
}

/// Cloneable handle for writing on the outbound socket.
#[derive(Clone)]
pub struct QueueSender {
    outbound: Arc<dyn RouterSocket>,
}

impl QueueSender {
    /// Sends `frames` to `receiver` as one multipart message.
    pub async fn send(&self, receiver: &Address, frames: Multipart) -> Result<(), NetworkError> {
        let mut routed = Vec::with_capacity(frames.len() + 1);
        routed.push(receiver.as_bytes().to_vec());
        routed.extend(frames);
        self.outbound.send_multipart(routed).await
    }
}

impl std::fmt::Debug for QueueSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSender")
            .field("endpoint", &self.outbound.endpoint())
            .finish()
    }
}

/// Drives the inbound socket and exposes the outbound one.
pub struct MessageQueue {
    inbound: Arc<dyn RouterSocket>,
    outbound: Arc<dyn RouterSocket>,
    shutdown: Mutex<ShutdownController>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MessageQueue {
    /// Wraps an inbound and an outbound socket. Neither is bound yet.
    #[must_use]
    pub fn new(inbound: Arc<dyn RouterSocket>, outbound: Arc<dyn RouterSocket>) -> Self {
        let shutdown = ShutdownController::new(inbound.endpoint());
        Self {
            inbound,
            outbound,
            shutdown: Mutex::new(shutdown),
            task: Mutex::new(None),
        }
    }

    /// Handle for the send path.
    #[must_use]
    pub fn sender(&self) -> QueueSender {
        QueueSender {
            outbound: Arc::clone(&self.outbound),
        }
    }

    /// Current endpoint of the inbound socket.
    #[must_use]
    pub fn inbound_endpoint(&self) -> String {
        self.inbound.endpoint()
    }

    /// Current endpoint of the outbound socket.
    #[must_use]
    pub fn outbound_endpoint(&self) -> String {
        self.outbound.endpoint()
    }

    /// Binds both sockets. If the outbound bind fails the inbound one is
    /// unbound again.
    pub async fn bind(&self) -> Result<(), NetworkError> {
        self.inbound.bind().await?;
        if let Err(e) = self.outbound.bind().await {
            if let Err(unbind) = self.inbound.unbind().await {
                warn!(error = %unbind, "Failed to unbind inbound socket after bind failure");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Unbinds both sockets, reporting the first failure after trying both.
    pub async fn unbind(&self) -> Result<(), NetworkError> {
        let inbound = self.inbound.unbind().await;
        let outbound = self.outbound.unbind().await;
        inbound.and(outbound)
    }

    /// Returns true while the receive loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Spawns the receive loop. Does nothing if it is already running.
    pub fn start(&self, handler: Arc<dyn PayloadHandler>) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let shutdown = ShutdownController::new(self.inbound.endpoint());
        *self.shutdown.lock() = shutdown.clone();
        *task = Some(tokio::spawn(receive_loop(
            Arc::clone(&self.inbound),
            handler,
            shutdown,
        )));
        info!(endpoint = %self.inbound.endpoint(), "Message queue started");
    }

    /// Stops accepting payloads and waits up to `timeout` for the one in
    /// flight. Returns false if the loop had to be aborted.
    pub async fn stop(&self, timeout: Duration) -> bool {
        let Some(task) = self.task.lock().take() else {
            return true;
        };
        let shutdown = self.shutdown.lock().clone();
        shutdown.initiate_shutdown();

        if shutdown.wait_for_completion(timeout).await {
            debug!(endpoint = %self.inbound.endpoint(), "Message queue drained");
            true
        } else {
            warn!(
                endpoint = %self.inbound.endpoint(),
                ?timeout,
                "In-flight payload did not finish, aborting receive loop"
            );
            task.abort();
            false
        }
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("inbound", &self.inbound.endpoint())
            .field("outbound", &self.outbound.endpoint())
            .field("running", &self.is_running())
            .finish()
    }
}

async fn receive_loop(
    inbound: Arc<dyn RouterSocket>,
    handler: Arc<dyn PayloadHandler>,
    shutdown: ShutdownController,
) {
    let mut signal = shutdown.subscribe();
    while !shutdown.is_shutdown_initiated() {
        let frames = tokio::select! {
            biased;
            _ = signal.recv() => break,
            frames = inbound.recv_multipart() => match frames {
                Some(frames) => frames,
                None => break,
            },
        };
        handler.handle_payload(frames).await;
    }
    debug!(endpoint = %inbound.endpoint(), "Receive loop exited");
    shutdown.mark_complete();
}
