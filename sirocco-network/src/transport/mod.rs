//! Router-style transports.
//!
//! A router socket receives multipart messages prefixed with the identity of
//! the peer that sent them, and routes outbound multipart messages by their
//! leading identity frame.

use async_trait::async_trait;
use sirocco_core::error::NetworkError;
use std::sync::Arc;

pub mod frame;
mod memory;
mod tcp;

pub use memory::{MemoryDealer, MemoryRouter};
pub use tcp::{TcpDealer, TcpRouterSocket};

/// Ordered frames of one multipart message.
pub type Multipart = Vec<Vec<u8>>;

/// Endpoint scheme for in-process sockets.
pub const MEMORY_SCHEME: &str = "mem://";

/// Endpoint scheme for TCP sockets.
pub const TCP_SCHEME: &str = "tcp://";

/// Socket with ROUTER semantics.
#[async_trait]
pub trait RouterSocket: Send + Sync {
    /// Binds the socket to its endpoint. Binding a bound socket is a no-op.
    async fn bind(&self) -> Result<(), NetworkError>;

    /// Unbinds the socket; pending and future `recv_multipart` calls return `None`.
    async fn unbind(&self) -> Result<(), NetworkError>;

    /// Sends `frames[1..]` to the peer named by `frames[0]`.
    async fn send_multipart(&self, frames: Multipart) -> Result<(), NetworkError>;

    /// Receives the next message as `[sender identity, frames...]`.
    async fn recv_multipart(&self) -> Option<Multipart>;

    /// Endpoint string, reflecting the bound address once bound.
    fn endpoint(&self) -> String;

    /// Number of peers currently routable.
    fn peer_count(&self) -> usize;
}

/// Builds a router socket for an endpoint string.
///
/// `mem://<name>` creates a [`MemoryRouter`], `tcp://<host>:<port>` a
/// [`TcpRouterSocket`].
///
/// ```
/// use sirocco_network::transport::router_for;
///
/// let socket = router_for("mem://requests", 1024).unwrap();
/// assert_eq!(socket.endpoint(), "mem://requests");
/// assert!(router_for("udp://127.0.0.1:1", 1024).is_err());
/// ```
pub fn router_for(
    endpoint: &str,
    max_frame_bytes: usize,
) -> Result<Arc<dyn RouterSocket>, NetworkError> {
    if endpoint.starts_with(MEMORY_SCHEME) {
        Ok(Arc::new(MemoryRouter::new(endpoint)))
    } else if let Some(addr) = endpoint.strip_prefix(TCP_SCHEME) {
        Ok(Arc::new(TcpRouterSocket::new(addr, max_frame_bytes)))
    } else {
        Err(NetworkError::BindFailed {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme, expected {MEMORY_SCHEME} or {TCP_SCHEME}"),
        })
    }
}

/// Splits the leading identity frame from a routed message.
pub(crate) fn split_identity(mut frames: Multipart) -> Result<(Vec<u8>, Multipart), NetworkError> {
    if frames.is_empty() {
        return Err(NetworkError::MalformedMessage {
            reason: "missing identity frame".to_string(),
        });
    }
    let identity = frames.remove(0);
    if identity.is_empty() {
        return Err(NetworkError::MalformedMessage {
            reason: "empty identity frame".to_string(),
        });
    }
    Ok((identity, frames))
}

pub(crate) fn display_identity(identity: &[u8]) -> String {
    String::from_utf8_lossy(identity).into_owned()
}
