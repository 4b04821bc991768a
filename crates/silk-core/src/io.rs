//! Minimal frame-boundary I/O shared by the handshake and the session
//! loop: read exactly one frame's bytes off a transport, decode it; encode
//! a message, write exactly its bytes.

use silk_proto::frame::{decode, encode, FrameCipher, MessageSize};
use silk_proto::{Message, ProtoError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Failure writing one frame: either the message itself was malformed
/// (e.g. oversized), or the transport write failed. Kept distinct from a
/// generic `std::io::Error` so callers can tell the two apart — e.g. map
/// back to `Malformed` vs `Transport` in their own error types — instead
/// of both collapsing into one opaque I/O error.
#[derive(Debug, Error)]
pub enum WriteFrameError {
    /// The message failed to encode (see [`ProtoError`]).
    #[error(transparent)]
    Malformed(#[from] ProtoError),
    /// The transport write itself failed.
    #[error(transparent)]
    Transport(#[from] std::io::Error),
}

/// Reads and decodes one frame from `io`, using and advancing `cipher`.
///
/// Returns `Ok(None)` on clean end-of-stream before any byte of the next
/// frame's size header arrives (the transport half-closed between
/// frames); any other I/O failure, including a partial header or body, is
/// returned as an error.
pub async fn read_frame<T: AsyncRead + Unpin>(
    io: &mut T,
    cipher: &mut FrameCipher,
) -> std::io::Result<Option<Result<Message, ProtoError>>> {
    let mut header = [0u8; 2];
    match io.read_exact(&mut header).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let size = MessageSize::parse(u16::from_le_bytes(header));
    let mut body = vec![0u8; size.wire_body_len()];
    io.read_exact(&mut body).await?;
    Ok(Some(decode(size, &body, cipher)))
}

/// Encodes `message` with `cipher` and writes it to `io`.
///
/// # Errors
///
/// Returns [`WriteFrameError::Malformed`] if `message` fails to encode
/// (e.g. its payload exceeds `PAYLOAD_MAX`), or
/// [`WriteFrameError::Transport`] if the write itself fails.
pub async fn write_frame<T: AsyncWrite + Unpin>(
    io: &mut T,
    message: &Message,
    cipher: &mut FrameCipher,
) -> Result<(), WriteFrameError> {
    let bytes = encode(message, cipher)?;
    io.write_all(&bytes).await?;
    Ok(())
}
