//! Serialization and compression collaborators.
//!
//! The message server is generic over how bodies and headers are encoded
//! and how frames are compressed. Each concern is a small trait with a
//! default implementation: [`JsonSerializer`], [`GzipCompressor`] and
//! [`BypassCompressor`].

mod compression;
mod json;

pub use compression::{BypassCompressor, GzipCompressor};
pub use json::JsonSerializer;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::CodecError;
use crate::messages::Header;

/// Encodes and decodes message bodies of type `T`.
pub trait MessageSerializer<T>: Send + Sync {
    /// Encodes a value.
    fn serialize(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decodes a value.
    fn deserialize(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// Encodes and decodes the string-keyed message header.
pub trait HeaderSerializer: Send + Sync {
    /// Encodes a header.
    fn serialize(&self, header: &Header) -> Result<Vec<u8>, CodecError>;

    /// Decodes a header.
    fn deserialize(&self, bytes: &[u8]) -> Result<Header, CodecError>;
}

/// Compresses and decompresses individual frames.
pub trait Compressor: Send + Sync {
    /// Compresses a frame.
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decompresses a frame, failing once the output would exceed `limit` bytes.
    fn decompress(&self, bytes: &[u8], limit: usize) -> Result<Vec<u8>, CodecError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Compression selected through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    /// Frames are sent as-is.
    None,
    /// Frames are gzip compressed.
    #[default]
    Gzip,
}

impl CompressionCodec {
    /// Builds the compressor for this codec.
    #[must_use]
    pub fn compressor(self) -> Arc<dyn Compressor> {
        match self {
            Self::None => Arc::new(BypassCompressor),
            Self::Gzip => Arc::new(GzipCompressor::default()),
        }
    }
}
