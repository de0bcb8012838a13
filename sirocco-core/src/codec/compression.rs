use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

use super::Compressor;
use crate::error::CodecError;

/// Gzip frame compressor.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    /// Creates a compressor with the given level (0-9).
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self {
            level: Compression::fast(),
        }
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), self.level);
        encoder
            .write_all(bytes)
            .and_then(|()| encoder.finish())
            .map_err(|e| CodecError::Compression {
                reason: e.to_string(),
            })
    }

    fn decompress(&self, bytes: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        // One byte past the limit is enough to tell an oversized frame apart.
        let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
        let mut out = Vec::new();
        GzDecoder::new(bytes)
            .take(cap)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression {
                reason: e.to_string(),
            })?;
        check_limit(out.len(), limit)?;
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "gzip"
    }
}

fn check_limit(len: usize, limit: usize) -> Result<(), CodecError> {
    if len > limit {
        return Err(CodecError::Decompression {
            reason: format!("decompressed frame exceeds {limit} bytes"),
        });
    }
    Ok(())
}

/// Pass-through compressor.
#[derive(Debug, Clone, Copy, Default)]
pub struct BypassCompressor;

impl Compressor for BypassCompressor {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }

    fn decompress(&self, bytes: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        check_limit(bytes.len(), limit)?;
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
