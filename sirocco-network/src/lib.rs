//! # Sirocco Network
//!
//! Message server node of the Sirocco messaging substrate.
//!
//! This crate provides:
//! - Router-style sockets (in-process and TCP) carrying multipart messages
//! - A message queue running the receive loop with a bounded graceful stop
//! - The message server protocol handler: frame validation, header decoding,
//!   session lifecycle, request/response correlation and rejection replies
//!
//! ```no_run
//! use sirocco_core::codec::CompressionCodec;
//! use sirocco_network::{Codecs, MessageServer, ServerConfig};
//!
//! # async fn run() -> Result<(), sirocco_network::MessageServerError> {
//! let config = ServerConfig::default();
//! let (server, mut inbox) = MessageServer::new(config, Codecs::json(CompressionCodec::Gzip))?;
//! server.start().await?;
//! while let Some(envelope) = inbox.recv().await {
//!     server.send_received(&envelope.message).await?;
//! }
//! server.stop().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

/// Server configuration
pub mod config;

/// Pending-request correlation
pub mod correlation;

/// Server errors
pub mod error;

/// Connected peers and sessions
pub mod peers;

/// Receive loop and send path
pub mod queue;

/// Protocol handler
pub mod server;

/// Stop coordination
pub mod shutdown;

/// Router sockets and framing
pub mod transport;

pub use config::ServerConfig;
pub use error::MessageServerError;
pub use server::{Codecs, InboundMessage, MessageServer, ServerState};
