//! Errors raised by the message server.

use sirocco_core::error::{CodecError, ConfigError, ErrorSeverity, MailboxError, NetworkError};
use sirocco_core::identifiers::MessageId;
use thiserror::Error;

use crate::server::ServerState;

/// Error returned by [`MessageServer`](crate::MessageServer) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageServerError {
    /// Lifecycle operation called in the wrong state.
    #[error("[Server] Cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the server was in.
        state: ServerState,
    },

    /// Socket failure.
    #[error("[Server] {0}")]
    Transport(#[from] NetworkError),

    /// Encoding or compression failure.
    #[error("[Server] {0}")]
    Codec(#[from] CodecError),

    /// Invalid server configuration.
    #[error("[Server] {0}")]
    Config(#[from] ConfigError),

    /// Application mailbox was dropped.
    #[error("[Server] {0}")]
    Mailbox(#[from] MailboxError),

    /// No pending request matches the response's correlation id.
    #[error("[Server] Cannot deliver response: no pending request for correlation id {correlation_id}")]
    UndeliverableResponse {
        /// Correlation id of the dropped response.
        correlation_id: MessageId,
    },
}

impl MessageServerError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidState { .. } | Self::UndeliverableResponse { .. } => {
                ErrorSeverity::Warning
            }
            Self::Transport(e) => e.severity(),
            Self::Codec(e) => e.severity(),
            Self::Config(e) => e.severity(),
            Self::Mailbox(e) => e.severity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message() {
        let err = MessageServerError::InvalidState {
            operation: "start",
            state: ServerState::Running,
        };
        assert_eq!(err.to_string(), "[Server] Cannot start while Running");
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_transport_severity_passes_through() {
        let err = MessageServerError::from(NetworkError::BindFailed {
            endpoint: "tcp://127.0.0.1:1".to_string(),
            reason: "denied".to_string(),
        });
        assert!(err.severity().is_fatal());
    }
}
