//! Network-related error types.
//!
//! Covers socket binding, multipart send/receive, peer routing and framing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Network error type covering socket lifecycle, routing and framing failures.
///
/// # Examples
///
/// ```
/// use sirocco_core::error::NetworkError;
///
/// let error = NetworkError::BindFailed {
///     endpoint: "127.0.0.1:5555".to_string(),
///     reason: "address in use".to_string(),
/// };
/// assert!(error.to_string().contains("address in use"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkError {
    /// Socket could not be bound to its endpoint.
    #[error("[Network] Failed to bind {endpoint}: {reason}")]
    BindFailed {
        /// Endpoint the socket attempted to bind.
        endpoint: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Operation requires a bound socket.
    #[error("[Network] Socket {endpoint} is not bound")]
    NotBound {
        /// Endpoint of the unbound socket.
        endpoint: String,
    },

    /// Socket was closed.
    #[error("[Network] Socket {endpoint} is closed")]
    Closed {
        /// Endpoint of the closed socket.
        endpoint: String,
    },

    /// No connected peer owns the routing identity.
    #[error("[Network] No route to peer {identity}")]
    UnknownPeer {
        /// Routing identity that could not be resolved.
        identity: String,
    },

    /// Frame exceeds the configured size limit.
    #[error("[Network] Frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Multipart message is structurally invalid.
    #[error("[Network] Malformed multipart message: {reason}")]
    MalformedMessage {
        /// What was wrong with the message.
        reason: String,
    },

    /// Operation timed out.
    #[error("[Network] Timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Underlying I/O failure.
    #[error("[Network] I/O error: {reason}")]
    Io {
        /// Reason for the I/O failure.
        reason: String,
    },
}

impl NetworkError {
    /// Returns true if this error is recoverable (can be retried).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity().is_recoverable()
    }

    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        use super::ErrorSeverity;
        match self {
            Self::BindFailed { .. } | Self::Closed { .. } => ErrorSeverity::Fatal,
            Self::Timeout { .. } | Self::Io { .. } | Self::NotBound { .. } => {
                ErrorSeverity::Recoverable
            }
            Self::UnknownPeer { .. }
            | Self::FrameTooLarge { .. }
            | Self::MalformedMessage { .. } => ErrorSeverity::Warning,
        }
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            reason: error.to_string(),
        }
    }
}
