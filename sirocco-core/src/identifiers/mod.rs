//! Identifier newtypes used to address servers, clients, sessions and messages.
//!
//! All identifiers compare by value. String-backed identifiers reject empty
//! input at construction; `Address` wraps the raw routing bytes of a peer.

mod address;
mod client_id;
mod message_id;
mod server_id;
mod session_id;

pub use address::Address;
pub use client_id::ClientId;
pub use message_id::MessageId;
pub use server_id::ServerId;
pub use session_id::SessionId;

use thiserror::Error;

/// Validation errors raised when constructing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Server id is empty.
    #[error("server ID cannot be empty")]
    EmptyServerId,

    /// Client id is empty.
    #[error("client ID cannot be empty")]
    EmptyClientId,

    /// Session id is empty.
    #[error("session ID cannot be empty")]
    EmptySessionId,

    /// Message id is not a valid UUID.
    #[error("invalid message ID: {0}")]
    InvalidMessageId(String),
}
