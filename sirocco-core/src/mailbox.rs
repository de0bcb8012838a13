//! Single-consumer mailboxes for message passing between components.
//!
//! A [`Mailbox`] is the cloneable sending half; an [`Inbox`] is the single
//! consumer. `tell` never blocks, so mailboxes can be fed from the
//! scheduler's worker thread as well as from async tasks.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::MailboxError;
use crate::identifiers::Address;

/// Message together with the address of whoever sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<M> {
    /// The message.
    pub message: M,
    /// Sender, if known.
    pub sender: Option<Address>,
}

/// Anything a message of type `M` can be delivered to.
pub trait Endpoint<M>: Send + Sync {
    /// Delivers a message without blocking.
    fn tell(&self, message: M, sender: Option<Address>) -> Result<(), MailboxError>;

    /// Path of the endpoint, for logs.
    fn path(&self) -> &str;
}

/// Sending half of a mailbox.
pub struct Mailbox<M> {
    path: Arc<str>,
    tx: mpsc::UnboundedSender<Envelope<M>>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            path: Arc::clone(&self.path),
            tx: self.tx.clone(),
        }
    }
}

impl<M> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox").field("path", &self.path).finish()
    }
}

impl<M: Send + 'static> Mailbox<M> {
    /// Creates a mailbox and its inbox.
    #[must_use]
    pub fn channel(path: impl Into<String>) -> (Self, Inbox<M>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let path: Arc<str> = Arc::from(path.into());
        (
            Self {
                path: Arc::clone(&path),
                tx,
            },
            Inbox { path, rx },
        )
    }

    /// Returns true once the inbox has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<M: Send + 'static> Endpoint<M> for Mailbox<M> {
    fn tell(&self, message: M, sender: Option<Address>) -> Result<(), MailboxError> {
        self.tx
            .send(Envelope { message, sender })
            .map_err(|_| MailboxError::Closed {
                path: self.path.to_string(),
            })
    }

    fn path(&self) -> &str {
        &self.path
    }
}

/// Receiving half of a mailbox.
#[derive(Debug)]
pub struct Inbox<M> {
    path: Arc<str>,
    rx: mpsc::UnboundedReceiver<Envelope<M>>,
}

impl<M> Inbox<M> {
    /// Waits for the next envelope; `None` once every mailbox is dropped.
    pub async fn recv(&mut self) -> Option<Envelope<M>> {
        self.rx.recv().await
    }

    /// Takes the next envelope if one is queued.
    pub fn try_recv(&mut self) -> Option<Envelope<M>> {
        self.rx.try_recv().ok()
    }

    /// Path of the mailbox.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of queued envelopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if no envelope is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
