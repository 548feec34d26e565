//! Wire framing for [`WireMessage`]
//!
//! Every message travels as a 4-byte big-endian length prefix followed by
//! the postcard encoding of the message. One connection carries exactly one
//! frame.

use bytes::Bytes;
use meshwave_core::WireMessage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum encoded message size (64 KiB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Length of the frame header
pub const HEADER_LEN: usize = 4;

/// Frame a message for wire transmission
///
/// Returns the length-prefixed bytes.
pub fn encode(msg: &WireMessage) -> Result<Bytes, FramingError> {
    let serialized =
        postcard::to_allocvec(msg).map_err(|e| FramingError::Serialization(e.to_string()))?;

    if serialized.len() > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge {
            size: serialized.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let len = serialized.len() as u32;
    let mut framed = Vec::with_capacity(HEADER_LEN + serialized.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&serialized);

    Ok(Bytes::from(framed))
}

/// Parse a framed message from bytes
///
/// Trailing bytes after the frame are ignored.
pub fn decode(data: &[u8]) -> Result<WireMessage, FramingError> {
    if data.len() < HEADER_LEN {
        return Err(FramingError::InsufficientData {
            needed: HEADER_LEN,
            available: data.len(),
        });
    }

    let len = frame_len([data[0], data[1], data[2], data[3]])?;

    if data.len() < HEADER_LEN + len {
        return Err(FramingError::InsufficientData {
            needed: HEADER_LEN + len,
            available: data.len(),
        });
    }

    decode_body(&data[HEADER_LEN..HEADER_LEN + len])
}

/// Read one framed message from a stream
pub async fn read_message<R>(reader: &mut R) -> Result<WireMessage, FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .await
        .map_err(|e| FramingError::Io(e.to_string()))?;

    let len = frame_len(header)?;
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| FramingError::Io(e.to_string()))?;

    decode_body(&body)
}

/// Write one framed message to a stream and flush it
pub async fn write_message<W>(writer: &mut W, msg: &WireMessage) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let framed = encode(msg)?;
    writer
        .write_all(&framed)
        .await
        .map_err(|e| FramingError::Io(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| FramingError::Io(e.to_string()))
}

fn frame_len(header: [u8; HEADER_LEN]) -> Result<usize, FramingError> {
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len)
}

fn decode_body(body: &[u8]) -> Result<WireMessage, FramingError> {
    postcard::from_bytes(body).map_err(|e| FramingError::Deserialization(e.to_string()))
}

/// Errors that can occur during message framing
#[derive(Debug, Clone, thiserror::Error)]
pub enum FramingError {
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Insufficient data: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("IO error: {0}")]
    Io(String),
}
