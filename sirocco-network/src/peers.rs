//! Connected peers and their sessions.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sirocco_core::identifiers::{Address, ClientId, SessionId};

/// Session held by a connected peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSession {
    /// Session minted on the peer's first `Connect`.
    pub session_id: SessionId,
    /// Routing address the `Connect` arrived from.
    pub address: Address,
    /// When the session was created.
    pub connected_at: DateTime<Utc>,
}

/// Outcome of [`PeerTable::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// A new session was created.
    New(SessionId),
    /// The peer was already connected; its session is unchanged.
    Existing(SessionId),
}

impl Connection {
    /// Session id in either case.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::New(id) | Self::Existing(id) => id,
        }
    }
}

/// Concurrent map from client id to its current session.
#[derive(Debug, Default)]
pub struct PeerTable {
    sessions: DashMap<ClientId, PeerSession>,
}

impl PeerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `client_id` unless it is already connected. `mint` runs only
    /// for a new session.
    pub fn connect<F>(&self, client_id: ClientId, address: Address, mint: F) -> Connection
    where
        F: FnOnce() -> SessionId,
    {
        match self.sessions.entry(client_id) {
            Entry::Occupied(entry) => Connection::Existing(entry.get().session_id.clone()),
            Entry::Vacant(entry) => {
                let session_id = mint();
                entry.insert(PeerSession {
                    session_id: session_id.clone(),
                    address,
                    connected_at: Utc::now(),
                });
                Connection::New(session_id)
            }
        }
    }

    /// Removes and returns the session of `client_id`.
    pub fn disconnect(&self, client_id: &ClientId) -> Option<PeerSession> {
        self.sessions.remove(client_id).map(|(_, session)| session)
    }

    /// Current session of `client_id`.
    #[must_use]
    pub fn session(&self, client_id: &ClientId) -> Option<PeerSession> {
        self.sessions.get(client_id).map(|entry| entry.value().clone())
    }

    /// Number of connected peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no peer is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of every connected peer.
    #[must_use]
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_is_idempotent() {
        let peers = PeerTable::new();
        let client = ClientId::new_unchecked("C1");

        let first = peers.connect(client.clone(), Address::from("C1"), || {
            SessionId::derive(&client, "tok")
        });
        assert!(matches!(first, Connection::New(_)));

        let second = peers.connect(client.clone(), Address::from("C1"), || {
            panic!("must not mint a second session")
        });
        assert_eq!(second, Connection::Existing(first.session_id().clone()));
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn test_disconnect() {
        let peers = PeerTable::new();
        let client = ClientId::new_unchecked("C1");
        assert!(peers.disconnect(&client).is_none());

        peers.connect(client.clone(), Address::from("addr"), || {
            SessionId::new("S-1").unwrap()
        });
        let session = peers.session(&client).unwrap();
        assert_eq!(session.address, Address::from("addr"));

        let removed = peers.disconnect(&client).unwrap();
        assert_eq!(removed.session_id.as_str(), "S-1");
        assert!(peers.is_empty());
        assert!(peers.client_ids().is_empty());
    }
}
