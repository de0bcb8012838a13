use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::identifiers::{ClientId, MessageId, SessionId};

/// Request sent by a client; the server answers each with a [`Response`](super::Response)
/// whose correlation id is the request's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Opens a session for a client.
    Connect {
        /// Message id.
        id: MessageId,
        /// Creation time.
        timestamp: DateTime<Utc>,
        /// Connecting client.
        client_id: ClientId,
        /// Opaque authentication token.
        authentication: String,
    },

    /// Closes the client's session.
    Disconnect {
        /// Message id.
        id: MessageId,
        /// Creation time.
        timestamp: DateTime<Utc>,
        /// Disconnecting client.
        client_id: ClientId,
        /// Session the client believes it holds.
        session_id: SessionId,
    },

    /// Application-level data query, forwarded to the server mailbox.
    Data {
        /// Message id.
        id: MessageId,
        /// Creation time.
        timestamp: DateTime<Utc>,
        /// Requested data type.
        data_type: String,
        /// Query parameters.
        query: BTreeMap<String, String>,
    },
}

impl Request {
    /// Creates a connect request.
    #[must_use]
    pub fn connect(client_id: ClientId, authentication: impl Into<String>) -> Self {
        Self::Connect {
            id: MessageId::generate(),
            timestamp: Utc::now(),
            client_id,
            authentication: authentication.into(),
        }
    }

    /// Creates a disconnect request.
    #[must_use]
    pub fn disconnect(client_id: ClientId, session_id: SessionId) -> Self {
        Self::Disconnect {
            id: MessageId::generate(),
            timestamp: Utc::now(),
            client_id,
            session_id,
        }
    }

    /// Creates a data request.
    #[must_use]
    pub fn data(data_type: impl Into<String>, query: BTreeMap<String, String>) -> Self {
        Self::Data {
            id: MessageId::generate(),
            timestamp: Utc::now(),
            data_type: data_type.into(),
            query,
        }
    }

    /// Returns the message id.
    #[must_use]
    pub fn id(&self) -> MessageId {
        match self {
            Self::Connect { id, .. } | Self::Disconnect { id, .. } | Self::Data { id, .. } => *id,
        }
    }

    /// Returns the creation time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Connect { timestamp, .. }
            | Self::Disconnect { timestamp, .. }
            | Self::Data { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the payload type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "Connect",
            Self::Disconnect { .. } => "Disconnect",
            Self::Data { .. } => "DataRequest",
        }
    }
}
