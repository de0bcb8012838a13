//! Pending-request index used to route responses back to their sender.

use dashmap::DashMap;
use sirocco_core::identifiers::{Address, MessageId};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Pending {
    reply_to: Address,
    inserted_at: Instant,
}

/// Concurrent map from request id to the address awaiting its response.
///
/// ```
/// use sirocco_core::identifiers::{Address, MessageId};
/// use sirocco_network::correlation::CorrelationIndex;
///
/// let index = CorrelationIndex::new();
/// let id = MessageId::generate();
/// index.insert(id, Address::from("C1"));
/// assert_eq!(index.pop(&id), Some(Address::from("C1")));
/// assert_eq!(index.pop(&id), None);
/// ```
#[derive(Debug, Default)]
pub struct CorrelationIndex {
    pending: DashMap<MessageId, Pending>,
}

impl CorrelationIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `reply_to` for `id`, returning the address it replaced.
    pub fn insert(&self, id: MessageId, reply_to: Address) -> Option<Address> {
        self.pending
            .insert(
                id,
                Pending {
                    reply_to,
                    inserted_at: Instant::now(),
                },
            )
            .map(|previous| previous.reply_to)
    }

    /// Removes and returns the address waiting on `id`.
    pub fn pop(&self, id: &MessageId) -> Option<Address> {
        self.pending.remove(id).map(|(_, pending)| pending.reply_to)
    }

    /// Returns true if a response for `id` is awaited.
    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of awaited responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no response is awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes entries older than `ttl` and returns their ids.
    pub fn purge_older_than(&self, ttl: Duration) -> Vec<MessageId> {
        let now = Instant::now();
        let mut purged = Vec::new();
        self.pending.retain(|id, pending| {
            let keep = now.saturating_duration_since(pending.inserted_at) < ttl;
            if !keep {
                purged.push(*id);
            }
            keep
        });
        purged
    }
}
