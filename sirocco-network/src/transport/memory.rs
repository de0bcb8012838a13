//! In-process router sockets.

use async_trait::async_trait;
use dashmap::DashMap;
use sirocco_core::error::NetworkError;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, trace};

use super::{Multipart, RouterSocket, display_identity, split_identity};

type PeerMap = Arc<DashMap<Vec<u8>, mpsc::UnboundedSender<Multipart>>>;

/// Router socket whose peers live in the same process.
///
/// Messages sent by dealers before the router is bound are queued and
/// delivered once it is.
pub struct MemoryRouter {
    endpoint: String,
    bound: watch::Sender<bool>,
    inbound_tx: mpsc::UnboundedSender<Multipart>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Multipart>>,
    peers: PeerMap,
}

impl MemoryRouter {
    /// Creates an unbound router.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            endpoint: endpoint.into(),
            bound: watch::Sender::new(false),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            peers: Arc::new(DashMap::new()),
        }
    }

    /// Connects a dealer with the given routing identity.
    ///
    /// A later dealer with the same identity takes over its route.
    #[must_use]
    pub fn connect(&self, identity: impl Into<Vec<u8>>) -> MemoryDealer {
        let identity = identity.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.insert(identity.clone(), tx);
        debug!(
            endpoint = %self.endpoint,
            identity = %display_identity(&identity),
            "Dealer connected"
        );
        MemoryDealer {
            identity,
            router_tx: self.inbound_tx.clone(),
            rx,
            peers: Arc::clone(&self.peers),
        }
    }

    fn is_bound(&self) -> bool {
        *self.bound.borrow()
    }
}

impl std::fmt::Debug for MemoryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRouter")
            .field("endpoint", &self.endpoint)
            .field("bound", &self.is_bound())
            .field("peers", &self.peers.len())
            .finish()
    }
}

#[async_trait]
impl RouterSocket for MemoryRouter {
    async fn bind(&self) -> Result<(), NetworkError> {
        self.bound.send_replace(true);
        debug!(endpoint = %self.endpoint, "Bound");
        Ok(())
    }

    async fn unbind(&self) -> Result<(), NetworkError> {
        if self.bound.send_replace(false) {
            self.peers.clear();
            debug!(endpoint = %self.endpoint, "Unbound");
        }
        Ok(())
    }

    async fn send_multipart(&self, frames: Multipart) -> Result<(), NetworkError> {
        if !self.is_bound() {
            return Err(NetworkError::NotBound {
                endpoint: self.endpoint.clone(),
            });
        }
        let (identity, rest) = split_identity(frames)?;
        let unknown = || NetworkError::UnknownPeer {
            identity: display_identity(&identity),
        };

        let tx = self.peers.get(&identity).map(|e| e.value().clone()).ok_or_else(unknown)?;
        if tx.send(rest).is_err() {
            self.peers.remove_if(&identity, |_, tx| tx.is_closed());
            return Err(unknown());
        }
        trace!(endpoint = %self.endpoint, "Routed multipart message");
        Ok(())
    }

    async fn recv_multipart(&self) -> Option<Multipart> {
        let mut bound = self.bound.subscribe();
        if !*bound.borrow_and_update() {
            return None;
        }
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            frames = rx.recv() => frames,
            _ = bound.wait_for(|b| !*b) => None,
        }
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

/// Client side of a [`MemoryRouter`] connection.
pub struct MemoryDealer {
    identity: Vec<u8>,
    router_tx: mpsc::UnboundedSender<Multipart>,
    rx: mpsc::UnboundedReceiver<Multipart>,
    peers: PeerMap,
}

impl MemoryDealer {
    /// Routing identity of this dealer.
    #[must_use]
    pub fn identity(&self) -> &[u8] {
        &self.identity
    }

    /// Sends a message; the router sees it prefixed with this dealer's identity.
    pub fn send(&self, frames: Multipart) -> Result<(), NetworkError> {
        let mut routed = Vec::with_capacity(frames.len() + 1);
        routed.push(self.identity.clone());
        routed.extend(frames);
        self.router_tx.send(routed).map_err(|_| NetworkError::Closed {
            endpoint: display_identity(&self.identity),
        })
    }

    /// Waits for the next message routed to this dealer; `None` once the
    /// router has dropped the route.
    pub async fn recv(&mut self) -> Option<Multipart> {
        self.rx.recv().await
    }
}

impl Drop for MemoryDealer {
    fn drop(&mut self) {
        self.rx.close();
        self.peers.remove_if(&self.identity, |_, tx| tx.is_closed());
    }
}

impl std::fmt::Debug for MemoryDealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDealer")
            .field("identity", &display_identity(&self.identity))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_inbound_is_prefixed_with_identity() {
        let router = MemoryRouter::new("mem://test");
        router.bind().await.unwrap();
        let dealer = router.connect("C1");

        dealer.send(vec![b"h".to_vec(), b"b".to_vec()]).unwrap();
        let frames = router.recv_multipart().await.unwrap();
        assert_eq!(frames, vec![b"C1".to_vec(), b"h".to_vec(), b"b".to_vec()]);
    }

    #[tokio::test]
    async fn test_outbound_routed_by_identity() {
        let router = MemoryRouter::new("mem://test");
        router.bind().await.unwrap();
        let mut a = router.connect("A");
        let mut b = router.connect("B");

        router
            .send_multipart(vec![b"B".to_vec(), b"hello".to_vec()])
            .await
            .unwrap();
        assert_eq!(b.recv().await.unwrap(), vec![b"hello".to_vec()]);
        assert!(a.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_and_unbound_errors() {
        let router = MemoryRouter::new("mem://test");
        let err = router
            .send_multipart(vec![b"A".to_vec()])
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::NotBound { .. }));

        router.bind().await.unwrap();
        let err = router
            .send_multipart(vec![b"ghost".to_vec(), b"x".to_vec()])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            NetworkError::UnknownPeer {
                identity: "ghost".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_dropped_dealer_removes_route() {
        let router = MemoryRouter::new("mem://test");
        let dealer = router.connect("A");
        assert_eq!(router.peer_count(), 1);
        drop(dealer);
        assert_eq!(router.peer_count(), 0);
    }

    #[tokio::test]
    async fn test_unbind_wakes_receiver() {
        let router = Arc::new(MemoryRouter::new("mem://test"));
        router.bind().await.unwrap();

        let reader = Arc::clone(&router);
        let handle = tokio::spawn(async move { reader.recv_multipart().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        router.unbind().await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(received.is_none());
        assert!(router.recv_multipart().await.is_none());
    }
}
