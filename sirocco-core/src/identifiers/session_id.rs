use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::{ClientId, ValidationError};

const NONE: &str = "NONE";

/// Logical session the server associates with a connected client.
///
/// `SessionId::none()` is the sentinel used when no session exists, for
/// example when a client disconnects without having connected.
///
/// ```
/// use sirocco_core::identifiers::{ClientId, SessionId};
///
/// let client = ClientId::new("C1").unwrap();
/// let a = SessionId::derive(&client, "tok");
/// let b = SessionId::derive(&client, "tok");
/// assert_eq!(a, b);
/// assert!(a.as_str().starts_with("C1-"));
/// assert!(SessionId::none().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session id.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptySessionId` if the value is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() {
            return Err(ValidationError::EmptySessionId);
        }
        Ok(Self(s))
    }

    /// Derives a session id from a client id and its authentication token.
    ///
    /// The token itself never appears in the result, only a truncated
    /// SHA-256 digest of `client:token`.
    #[must_use]
    pub fn derive(client_id: &ClientId, authentication: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(client_id.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(authentication.as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("{client_id}-{}", &digest[..16]))
    }

    /// Returns the "no session" sentinel.
    #[must_use]
    pub fn none() -> Self {
        Self(NONE.to_string())
    }

    /// Returns true if this is the "no session" sentinel.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0 == NONE
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
