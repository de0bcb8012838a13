use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw routing identity of a peer, as carried in the first frame of a
/// multipart message.
///
/// The empty address is the `none()` sentinel for a malformed or absent sender.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(Vec<u8>);

impl Address {
    /// Wraps raw identity bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the sentinel for an absent sender.
    #[must_use]
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    /// Builds an address from a sender frame; an empty frame yields `none()`.
    #[must_use]
    pub fn from_frame(frame: &[u8]) -> Self {
        Self(frame.to_vec())
    }

    /// Returns true if this is the `none()` sentinel.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the raw identity bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the address and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("None");
        }
        match std::str::from_utf8(&self.0) {
            Ok(s) if s.chars().all(|c| !c.is_control()) => f.write_str(s),
            _ => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_equality() {
        assert_eq!(Address::from("peer-1"), Address::new(b"peer-1".to_vec()));
        assert_ne!(Address::from("peer-1"), Address::from("peer-2"));
    }

    #[test]
    fn test_empty_frame_is_none() {
        assert!(Address::from_frame(&[]).is_none());
        assert_eq!(Address::from_frame(&[]), Address::none());
        assert_eq!(Address::none().to_string(), "None");
    }

    #[test]
    fn test_display_binary_identity() {
        let address = Address::new(vec![0x00, 0x6b, 0x8b, 0x45]);
        assert_eq!(address.to_string(), "0x006b8b45");
    }
}
