use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::identifiers::MessageId;

/// Instruction sent by a client for the application to act on.
///
/// Commands are only accepted by a server that has a command serializer
/// registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Message id.
    pub id: MessageId,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Command name, e.g. `TradeApproval`.
    pub name: String,
    /// Named arguments.
    pub arguments: BTreeMap<String, String>,
}

impl Command {
    /// Creates a command with no arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            timestamp: Utc::now(),
            name: name.into(),
            arguments: BTreeMap::new(),
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Returns the message id.
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the creation time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the payload type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.name
    }
}
