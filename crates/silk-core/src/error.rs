//! Handshake and protocol-state errors.

use silk_proto::ProtoError;
use thiserror::Error;

use crate::io::WriteFrameError;

/// Errors that can arise while negotiating or holding protocol state.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// A frame failed to decode, or decoded but violated a framing
    /// invariant.
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// A non-SETUP opcode arrived before the handshake reached `Ready`.
    #[error("unexpected opcode {opcode:#06x} received in handshake state {state}")]
    UnexpectedOpcode {
        /// The opcode that arrived.
        opcode: u16,
        /// The handshake state at the time.
        state: &'static str,
    },

    /// The challenge or response tag did not match the value this side
    /// computed from the shared secret.
    #[error("handshake challenge/response tag mismatch")]
    ChallengeMismatch,

    /// The transport ended before the handshake completed.
    #[error("transport closed during handshake")]
    TransportClosed,

    /// Transport I/O failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl From<WriteFrameError> for HandshakeError {
    fn from(err: WriteFrameError) -> Self {
        match err {
            WriteFrameError::Malformed(e) => Self::Proto(e),
            WriteFrameError::Transport(e) => Self::Transport(e),
        }
    }
}

impl HandshakeError {
    /// Whether this failure should be treated as fatal for the session
    /// (all handshake failures are, per the protocol's error taxonomy —
    /// this accessor exists for symmetry with the session-level error type
    /// and to make that fact explicit at call sites).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        true
    }
}
