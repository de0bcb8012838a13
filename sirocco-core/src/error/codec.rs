//! Serialization and compression error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codec error raised by serializers, header serializers and compressors.
///
/// The [`kind`](CodecError::kind) name is stable and is quoted verbatim in
/// rejection responses sent back to peers.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodecError {
    /// Value could not be encoded.
    #[error("[Codec] Serialization failed: {reason}")]
    Serialization {
        /// Reason for the failure.
        reason: String,
    },

    /// Bytes could not be decoded into the expected type.
    #[error("[Codec] Deserialization failed: {reason}")]
    Deserialization {
        /// Reason for the failure.
        reason: String,
    },

    /// Payload could not be compressed.
    #[error("[Codec] Compression failed: {reason}")]
    Compression {
        /// Reason for the failure.
        reason: String,
    },

    /// Payload could not be decompressed.
    #[error("[Codec] Decompression failed: {reason}")]
    Decompression {
        /// Reason for the failure.
        reason: String,
    },

    /// Header map is missing a required key.
    #[error("[Codec] Header is missing key '{key}'")]
    MissingHeader {
        /// The missing key.
        key: String,
    },
}

impl CodecError {
    /// Returns the stable type name of this error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Serialization { .. } => "SerializationError",
            Self::Deserialization { .. } => "DeserializationError",
            Self::Compression { .. } => "CompressionError",
            Self::Decompression { .. } => "DecompressionError",
            Self::MissingHeader { .. } => "MissingHeaderError",
        }
    }

    /// Returns the reason without the category prefix.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Serialization { reason }
            | Self::Deserialization { reason }
            | Self::Compression { reason }
            | Self::Decompression { reason } => reason.clone(),
            Self::MissingHeader { key } => format!("missing key '{key}'"),
        }
    }

    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        use super::ErrorSeverity;
        match self {
            Self::Serialization { .. } | Self::Compression { .. } => ErrorSeverity::Fatal,
            Self::Deserialization { .. }
            | Self::Decompression { .. }
            | Self::MissingHeader { .. } => ErrorSeverity::Warning,
        }
    }

    /// Creates a deserialization error from any displayable cause.
    pub fn deserialization(cause: impl std::fmt::Display) -> Self {
        Self::Deserialization {
            reason: cause.to_string(),
        }
    }

    /// Creates a serialization error from any displayable cause.
    pub fn serialization(cause: impl std::fmt::Display) -> Self {
        Self::Serialization {
            reason: cause.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(
            CodecError::deserialization("bad").kind(),
            "DeserializationError"
        );
        assert_eq!(
            CodecError::MissingHeader {
                key: "MessageType".to_string()
            }
            .kind(),
            "MissingHeaderError"
        );
    }

    #[test]
    fn test_reason_strips_prefix() {
        let error = CodecError::Decompression {
            reason: "invalid gzip header".to_string(),
        };
        assert_eq!(error.reason(), "invalid gzip header");
        assert!(error.to_string().starts_with("[Codec]"));
    }
}
