//! Error types for the wire codec.

use thiserror::Error;

/// Errors produced while encoding or decoding frames and messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtoError {
    /// A typed read ran past the end of the message payload.
    #[error("read past end of message: wanted {wanted} bytes, {available} available")]
    Overrun {
        /// Bytes requested by the read.
        wanted: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// A message payload exceeds `PAYLOAD_MAX`.
    #[error("payload of {size} bytes exceeds PAYLOAD_MAX ({max})")]
    PayloadTooLarge {
        /// Size that was rejected.
        size: usize,
        /// The configured ceiling.
        max: usize,
    },

    /// A frame's buffer was shorter than its own declared header demanded.
    #[error("buffer too short: need {need} bytes, have {have}")]
    BufferTooShort {
        /// Bytes required by the header.
        need: usize,
        /// Bytes actually supplied.
        have: usize,
    },

    /// The `encrypted` bit of the size header didn't match the active
    /// protocol option.
    #[error("encryption bit mismatch: frame says {frame_encrypted}, session expects {session_encrypted}")]
    EncryptionMismatch {
        /// What the wire header claimed.
        frame_encrypted: bool,
        /// What the session's negotiated options require.
        session_encrypted: bool,
    },

    /// Count or CRC byte did not match the value the deterministic
    /// generators predicted.
    #[error("frame tag mismatch: count or crc byte does not match the expected sequence")]
    TagMismatch,

    /// A MASSIVE reassembly rule was violated (header without chunks,
    /// dangling partial, two headers in a row, etc).
    #[error("MASSIVE reassembly violation: {0}")]
    MassiveViolation(&'static str),
}
