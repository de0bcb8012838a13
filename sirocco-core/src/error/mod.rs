//! Error types and handling framework.
//!
//! This module provides a hierarchical error type system with
//! domain-specific error categories for the Sirocco messaging substrate.
//!
//! # Error Hierarchy
//!
//! - `SiroccoError` - Top-level error type
//!   - `NetworkError` - Socket, transport and framing errors
//!   - `CodecError` - Serialization and compression errors
//!   - `ConfigError` - Configuration errors
//!   - `MailboxError` - Local message delivery errors
//!
//! ```
//! use sirocco_core::error::{NetworkError, SiroccoError};
//!
//! let error = SiroccoError::from(NetworkError::Closed {
//!     endpoint: "tcp://127.0.0.1:5555".to_string(),
//! });
//! assert_eq!(error.category(), "network");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error severity levels for categorizing errors.
///
/// - `Fatal`: Unrecoverable errors that require immediate attention
/// - `Recoverable`: Errors that can be retried or recovered from
/// - `Warning`: Non-critical issues that should be logged
/// - `Info`: Informational messages about expected conditions
///
/// ```
/// use sirocco_core::error::ErrorSeverity;
///
/// let severity = ErrorSeverity::Recoverable;
/// assert!(severity.is_recoverable());
/// assert!(!severity.is_fatal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Unrecoverable error requiring immediate attention.
    Fatal,

    /// Error that can potentially be recovered from through retry or fallback.
    #[default]
    Recoverable,

    /// Non-critical issue that should be logged but doesn't prevent operation.
    Warning,

    /// Informational message about an expected or handled condition.
    Info,
}

impl ErrorSeverity {
    /// Returns true if this error is recoverable (not fatal).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }

    /// Returns true if this error is fatal (unrecoverable).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Returns the severity as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Recoverable => "RECOVERABLE",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

mod codec;
mod config;
mod mailbox;
mod network;

pub use codec::CodecError;
pub use config::ConfigError;
pub use mailbox::MailboxError;
pub use network::NetworkError;

/// Top-level error type for the Sirocco messaging substrate.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiroccoError {
    /// Network-related error.
    #[error("{0}")]
    Network(#[from] NetworkError),

    /// Serialization or compression error.
    #[error("{0}")]
    Codec(#[from] CodecError),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Local delivery error.
    #[error("{0}")]
    Mailbox(#[from] MailboxError),
}

impl SiroccoError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Network(e) => e.severity(),
            Self::Codec(e) => e.severity(),
            Self::Config(e) => e.severity(),
            Self::Mailbox(e) => e.severity(),
        }
    }

    /// Returns true if this error is recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity().is_recoverable()
    }

    /// Returns the error category as a string.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Codec(_) => "codec",
            Self::Config(_) => "config",
            Self::Mailbox(_) => "mailbox",
        }
    }
}
