//! Router sockets over TCP.
//!
//! A dealer opens a connection and announces its routing identity as a
//! single-frame multipart message. Every later message from that connection
//! reaches the router prefixed with the identity.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use sirocco_core::error::NetworkError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::frame::{read_multipart, write_multipart};
use super::{Multipart, RouterSocket, TCP_SCHEME, display_identity, split_identity};

type PeerMap = Arc<DashMap<Vec<u8>, mpsc::UnboundedSender<Multipart>>>;

/// Router socket listening on a TCP address.
pub struct TcpRouterSocket {
    addr: String,
    max_frame_bytes: usize,
    local_addr: SyncMutex<Option<SocketAddr>>,
    bound: watch::Sender<bool>,
    inbound_tx: mpsc::UnboundedSender<Multipart>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Multipart>>,
    peers: PeerMap,
    accept_task: SyncMutex<Option<JoinHandle<()>>>,
}

impl TcpRouterSocket {
    /// Creates an unbound socket for `host:port`. Port `0` picks a free port
    /// at bind time.
    #[must_use]
    pub fn new(addr: impl Into<String>, max_frame_bytes: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            addr: addr.into(),
            max_frame_bytes,
            local_addr: SyncMutex::new(None),
            bound: watch::Sender::new(false),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            peers: Arc::new(DashMap::new()),
            accept_task: SyncMutex::new(None),
        }
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

impl std::fmt::Debug for TcpRouterSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpRouterSocket")
            .field("endpoint", &self.endpoint())
            .field("peers", &self.peers.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RouterSocket for TcpRouterSocket {
    async fn bind(&self) -> Result<(), NetworkError> {
        if *self.bound.borrow() {
            return Ok(());
        }
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| NetworkError::BindFailed {
                endpoint: format!("{TCP_SCHEME}{}", self.addr),
                reason: e.to_string(),
            })?;
        let local = listener.local_addr()?;
        *self.local_addr.lock() = Some(local);
        self.bound.send_replace(true);

        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.peers),
            self.inbound_tx.clone(),
            self.bound.subscribe(),
            self.max_frame_bytes,
        ));
        *self.accept_task.lock() = Some(task);
        info!(endpoint = %self.endpoint(), "Listening");
        Ok(())
    }

    async fn unbind(&self) -> Result<(), NetworkError> {
        if self.bound.send_replace(false) {
            if let Some(task) = self.accept_task.lock().take() {
                task.abort();
            }
            self.peers.clear();
            info!(endpoint = %self.endpoint(), "Unbound");
        }
        Ok(())
    }

    async fn send_multipart(&self, frames: Multipart) -> Result<(), NetworkError> {
        if !*self.bound.borrow() {
            return Err(NetworkError::NotBound {
                endpoint: self.endpoint(),
            });
        }
        let (identity, rest) = split_identity(frames)?;
        let unknown = || NetworkError::UnknownPeer {
            identity: display_identity(&identity),
        };
        let tx = self
            .peers
            .get(&identity)
            .map(|e| e.value().clone())
            .ok_or_else(unknown)?;
        tx.send(rest).map_err(|_| unknown())
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
        match self.local_addr() {
            Some(addr) => format!("{TCP_SCHEME}{addr}"),
            None => format!("{TCP_SCHEME}{}", self.addr),
        }
    }

    fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

async fn accept_loop(
    listener: TcpListener,
    peers: PeerMap,
    inbound_tx: mpsc::UnboundedSender<Multipart>,
    mut bound: watch::Receiver<bool>,
    max_frame_bytes: usize,
) {
    loop {
        let peer_bound = bound.clone();
        tokio::select! {
            _ = bound.wait_for(|b| !*b) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    tokio::spawn(serve_peer(
                        stream,
                        remote,
                        Arc::clone(&peers),
                        inbound_tx.clone(),
                        peer_bound,
                        max_frame_bytes,
                    ));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },
        }
    }
}

async fn serve_peer(
    stream: TcpStream,
    remote: SocketAddr,
    peers: PeerMap,
    inbound_tx: mpsc::UnboundedSender<Multipart>,
    mut bound: watch::Receiver<bool>,
    max_frame_bytes: usize,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%remote, error = %e, "Could not disable Nagle");
    }
    let (mut reader, mut writer) = stream.into_split();

    let identity = match read_multipart(&mut reader, max_frame_bytes).await {
        Ok(Some(mut frames)) if frames.len() == 1 && !frames[0].is_empty() => frames.remove(0),
        Ok(_) => {
            warn!(%remote, "Peer did not announce a routing identity");
            return;
        }
        Err(e) => {
            warn!(%remote, error = %e, "Identity handshake failed");
            return;
        }
    };
    let name = display_identity(&identity);

    let (tx, mut rx) = mpsc::unbounded_channel::<Multipart>();
    if peers.insert(identity.clone(), tx.clone()).is_some() {
        warn!(%remote, identity = %name, "Identity reconnected, replacing previous route");
    } else {
        debug!(%remote, identity = %name, "Peer connected");
    }

    let writer_task = tokio::spawn(async move {
        while let Some(frames) = rx.recv().await {
            if let Err(e) = write_multipart(&mut writer, &frames, max_frame_bytes).await {
                debug!(error = %e, "Write to peer failed");
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = bound.wait_for(|b| !*b) => break,
            read = read_multipart(&mut reader, max_frame_bytes) => match read {
                Ok(Some(frames)) => {
                    trace!(identity = %name, frames = frames.len(), "Received multipart message");
                    let mut routed = Vec::with_capacity(frames.len() + 1);
                    routed.push(identity.clone());
                    routed.extend(frames);
                    if inbound_tx.send(routed).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(identity = %name, error = %e, "Dropping peer after read failure");
                    break;
                }
            },
        }
    }

    peers.remove_if(&identity, |_, route| route.same_channel(&tx));
    writer_task.abort();
    debug!(%remote, identity = %name, "Peer disconnected");
}

/// Client side of a [`TcpRouterSocket`] connection.
#[derive(Debug)]
pub struct TcpDealer {
    identity: Vec<u8>,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    max_frame_bytes: usize,
}

impl TcpDealer {
    /// Connects to `tcp://host:port` (or bare `host:port`) and announces `identity`.
    pub async fn connect(
        endpoint: &str,
        identity: impl Into<Vec<u8>>,
        max_frame_bytes: usize,
    ) -> Result<Self, NetworkError> {
        let identity = identity.into();
        let addr = endpoint.strip_prefix(TCP_SCHEME).unwrap_or(endpoint);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, mut writer) = stream.into_split();
        write_multipart(&mut writer, std::slice::from_ref(&identity), max_frame_bytes).await?;
        Ok(Self {
            identity,
            reader,
            writer,
            max_frame_bytes,
        })
    }

    /// Routing identity of this dealer.
    #[must_use]
    pub fn identity(&self) -> &[u8] {
        &self.identity
    }

    /// Sends a multipart message.
    pub async fn send(&mut self, frames: &[Vec<u8>]) -> Result<(), NetworkError> {
        write_multipart(&mut self.writer, frames, self.max_frame_bytes).await
    }

    /// Receives the next multipart message; `None` once the router closed the connection.
    pub async fn recv(&mut self) -> Result<Option<Multipart>, NetworkError> {
        read_multipart(&mut self.reader, self.max_frame_bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for_peers(router: &TcpRouterSocket, count: usize) {
        for _ in 0..200 {
            if router.peer_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} peers, found {}", router.peer_count());
    }

    #[tokio::test]
    async fn test_round_trip_over_loopback() {
        let router = TcpRouterSocket::new("127.0.0.1:0", 1024);
        router.bind().await.unwrap();
        let endpoint = router.endpoint();
        assert!(endpoint.starts_with("tcp://127.0.0.1:"));
        assert!(!endpoint.ends_with(":0"));

        let mut dealer = TcpDealer::connect(&endpoint, "C1", 1024).await.unwrap();
        wait_for_peers(&router, 1).await;

        dealer.send(&[b"ping".to_vec()]).await.unwrap();
        let inbound = router.recv_multipart().await.unwrap();
        assert_eq!(inbound, vec![b"C1".to_vec(), b"ping".to_vec()]);

        router
            .send_multipart(vec![b"C1".to_vec(), b"pong".to_vec()])
            .await
            .unwrap();
        assert_eq!(dealer.recv().await.unwrap(), Some(vec![b"pong".to_vec()]));

        router.unbind().await.unwrap();
        assert!(router.recv_multipart().await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_removes_route() {
        let router = TcpRouterSocket::new("127.0.0.1:0", 1024);
        router.bind().await.unwrap();
        let dealer = TcpDealer::connect(&router.endpoint(), "C2", 1024)
            .await
            .unwrap();
        wait_for_peers(&router, 1).await;

        drop(dealer);
        wait_for_peers(&router, 0).await;
        let err = router
            .send_multipart(vec![b"C2".to_vec(), b"x".to_vec()])
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::UnknownPeer { .. }));
        router.unbind().await.unwrap();
    }

    #[tokio::test]
    async fn test_unbind_closes_connected_peers() {
        let router = TcpRouterSocket::new("127.0.0.1:0", 1024);
        router.bind().await.unwrap();
        let endpoint = router.endpoint();
        let mut first = TcpDealer::connect(&endpoint, "C1", 1024).await.unwrap();
        let mut second = TcpDealer::connect(&endpoint, "C2", 1024).await.unwrap();
        wait_for_peers(&router, 2).await;

        router.unbind().await.unwrap();
        for dealer in [&mut first, &mut second] {
            let closed = tokio::time::timeout(Duration::from_secs(1), dealer.recv())
                .await
                .expect("peer connection still open after unbind");
            assert!(matches!(closed, Ok(None) | Err(_)));
        }
        assert_eq!(router.peer_count(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_reports_endpoint() {
        let first = TcpRouterSocket::new("127.0.0.1:0", 1024);
        first.bind().await.unwrap();
        let taken = first.local_addr().unwrap().to_string();

        let second = TcpRouterSocket::new(taken, 1024);
        let err = second.bind().await.unwrap_err();
        assert!(matches!(err, NetworkError::BindFailed { .. }));
        first.unbind().await.unwrap();
    }
}
