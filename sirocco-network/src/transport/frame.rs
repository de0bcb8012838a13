//! Length-prefixed multipart framing for stream transports.
//!
//! Wire layout: `u32` big-endian frame count, then for every frame a `u32`
//! big-endian length followed by the frame bytes.

use sirocco_core::error::NetworkError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::Multipart;

/// Largest number of frames accepted in one multipart message.
pub const MAX_FRAMES: usize = 64;

/// Default per-frame size limit.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Encodes a multipart message into a single buffer.
///
/// # Errors
///
/// Fails if there are more than [`MAX_FRAMES`] frames or a frame exceeds
/// `max_frame_bytes`.
pub fn encode_multipart(
    frames: &[Vec<u8>],
    max_frame_bytes: usize,
) -> Result<Vec<u8>, NetworkError> {
    if frames.len() > MAX_FRAMES {
        return Err(NetworkError::MalformedMessage {
            reason: format!("{} frames exceeds limit of {MAX_FRAMES}", frames.len()),
        });
    }
    let payload: usize = frames.iter().map(Vec::len).sum();
    let mut buf = Vec::with_capacity(4 + frames.len() * 4 + payload);
    buf.extend_from_slice(&(frames.len() as u32).to_be_bytes());
    for frame in frames {
        if frame.len() > max_frame_bytes {
            return Err(NetworkError::FrameTooLarge {
                size: frame.len(),
                max: max_frame_bytes,
            });
        }
        buf.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        buf.extend_from_slice(frame);
    }
    Ok(buf)
}

/// Writes one multipart message.
pub async fn write_multipart<W>(
    writer: &mut W,
    frames: &[Vec<u8>],
    max_frame_bytes: usize,
) -> Result<(), NetworkError>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode_multipart(frames, max_frame_bytes)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one multipart message. Returns `None` on a clean end of stream
/// before the first byte of a message.
pub async fn read_multipart<R>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<Multipart>, NetworkError>
where
    R: AsyncRead + Unpin,
{
    let count = match reader.read_u32().await {
        Ok(count) => count as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if count > MAX_FRAMES {
        return Err(NetworkError::MalformedMessage {
            reason: format!("{count} frames exceeds limit of {MAX_FRAMES}"),
        });
    }

    let mut frames = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.read_u32().await? as usize;
        if len > max_frame_bytes {
            return Err(NetworkError::FrameTooLarge {
                size: len,
                max: max_frame_bytes,
            });
        }
        let mut frame = vec![0; len];
        reader.read_exact(&mut frame).await?;
        frames.push(frame);
    }
    Ok(Some(frames))
}
