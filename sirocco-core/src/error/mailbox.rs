//! Local delivery error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when a message cannot be delivered to a local mailbox.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MailboxError {
    /// The receiving side of the mailbox has been dropped.
    #[error("[Mailbox] Mailbox {path} is closed")]
    Closed {
        /// Path of the closed mailbox.
        path: String,
    },
}

impl MailboxError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        super::ErrorSeverity::Warning
    }
}
