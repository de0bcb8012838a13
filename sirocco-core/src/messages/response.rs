use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::identifiers::{MessageId, ServerId, SessionId};

/// Response sent by the server, correlated to the request it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Session established (or already established).
    Connected {
        /// Message id.
        id: MessageId,
        /// Id of the answered request.
        correlation_id: MessageId,
        /// Creation time.
        timestamp: DateTime<Utc>,
        /// Human readable description.
        message: String,
        /// Responding server.
        server_id: ServerId,
        /// Session of the client.
        session_id: SessionId,
    },

    /// Session closed, or none to close.
    Disconnected {
        /// Message id.
        id: MessageId,
        /// Id of the answered request.
        correlation_id: MessageId,
        /// Creation time.
        timestamp: DateTime<Utc>,
        /// Human readable description.
        message: String,
        /// Responding server.
        server_id: ServerId,
        /// Closed session, or `SessionId::none()`.
        session_id: SessionId,
    },

    /// Acknowledges receipt of a message.
    MessageReceived {
        /// Message id.
        id: MessageId,
        /// Id of the acknowledged message.
        correlation_id: MessageId,
        /// Creation time.
        timestamp: DateTime<Utc>,
        /// Type name of the acknowledged message.
        received_type: String,
    },

    /// Inbound message could not be accepted.
    MessageRejected {
        /// Message id.
        id: MessageId,
        /// Id of the rejected message, nil when unknown.
        correlation_id: MessageId,
        /// Creation time.
        timestamp: DateTime<Utc>,
        /// Rejection reason.
        message: String,
    },

    /// Query could not be answered.
    QueryFailure {
        /// Message id.
        id: MessageId,
        /// Id of the failed query.
        correlation_id: MessageId,
        /// Creation time.
        timestamp: DateTime<Utc>,
        /// Failure reason.
        message: String,
    },

    /// Data answering a data request.
    Data {
        /// Message id.
        id: MessageId,
        /// Id of the data request.
        correlation_id: MessageId,
        /// Creation time.
        timestamp: DateTime<Utc>,
        /// Type of the payload.
        data_type: String,
        /// Encoded payload.
        data: Vec<u8>,
        /// Free-form metadata.
        metadata: BTreeMap<String, String>,
    },
}

impl Response {
    /// Creates a `Connected` response.
    #[must_use]
    pub fn connected(
        correlation_id: MessageId,
        message: impl Into<String>,
        server_id: ServerId,
        session_id: SessionId,
    ) -> Self {
        Self::Connected {
            id: MessageId::generate(),
            correlation_id,
            timestamp: Utc::now(),
            message: message.into(),
            server_id,
            session_id,
        }
    }

    /// Creates a `Disconnected` response.
    #[must_use]
    pub fn disconnected(
        correlation_id: MessageId,
        message: impl Into<String>,
        server_id: ServerId,
        session_id: SessionId,
    ) -> Self {
        Self::Disconnected {
            id: MessageId::generate(),
            correlation_id,
            timestamp: Utc::now(),
            message: message.into(),
            server_id,
            session_id,
        }
    }

    /// Creates a `MessageReceived` acknowledgement.
    #[must_use]
    pub fn received(correlation_id: MessageId, received_type: impl Into<String>) -> Self {
        Self::MessageReceived {
            id: MessageId::generate(),
            correlation_id,
            timestamp: Utc::now(),
            received_type: received_type.into(),
        }
    }

    /// Creates a `MessageRejected` response.
    #[must_use]
    pub fn rejected(correlation_id: MessageId, message: impl Into<String>) -> Self {
        Self::MessageRejected {
            id: MessageId::generate(),
            correlation_id,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// Creates a `QueryFailure` response.
    #[must_use]
    pub fn query_failure(correlation_id: MessageId, message: impl Into<String>) -> Self {
        Self::QueryFailure {
            id: MessageId::generate(),
            correlation_id,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// Creates a `Data` response.
    #[must_use]
    pub fn data(correlation_id: MessageId, data_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Data {
            id: MessageId::generate(),
            correlation_id,
            timestamp: Utc::now(),
            data_type: data_type.into(),
            data,
            metadata: BTreeMap::new(),
        }
    }

    /// Returns the message id.
    #[must_use]
    pub fn id(&self) -> MessageId {
        match self {
            Self::Connected { id, .. }
            | Self::Disconnected { id, .. }
            | Self::MessageReceived { id, .. }
            | Self::MessageRejected { id, .. }
            | Self::QueryFailure { id, .. }
            | Self::Data { id, .. } => *id,
        }
    }

    /// Returns the id of the message this response answers.
    #[must_use]
    pub fn correlation_id(&self) -> MessageId {
        match self {
            Self::Connected { correlation_id, .. }
            | Self::Disconnected { correlation_id, .. }
            | Self::MessageReceived { correlation_id, .. }
            | Self::MessageRejected { correlation_id, .. }
            | Self::QueryFailure { correlation_id, .. }
            | Self::Data { correlation_id, .. } => *correlation_id,
        }
    }

    /// Returns the creation time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Connected { timestamp, .. }
            | Self::Disconnected { timestamp, .. }
            | Self::MessageReceived { timestamp, .. }
            | Self::MessageRejected { timestamp, .. }
            | Self::QueryFailure { timestamp, .. }
            | Self::Data { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the payload type name carried in the response header.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "Connected",
            Self::Disconnected { .. } => "Disconnected",
            Self::MessageReceived { .. } => "MessageReceived",
            Self::MessageRejected { .. } => "MessageRejected",
            Self::QueryFailure { .. } => "QueryFailure",
            Self::Data { .. } => "DataResponse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_carries_correlation() {
        let request_id = MessageId::generate();
        let response = Response::rejected(request_id, "bad frame");
        assert_eq!(response.correlation_id(), request_id);
        assert_ne!(response.id(), request_id);
        assert_eq!(response.type_name(), "MessageRejected");
    }

    #[test]
    fn test_connected_serde() {
        let response = Response::connected(
            MessageId::generate(),
            "connected",
            ServerId::new("S").unwrap(),
            SessionId::new("C1-abc").unwrap(),
        );
        let json = serde_json::to_string(&response).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
    }
}
