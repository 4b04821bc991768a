//! Session-level errors (C6/C7): the union of everything that can make a
//! session's run loop stop.

use silk_core::{HandshakeError, WriteFrameError};
use silk_proto::ProtoError;
use thiserror::Error;

/// Errors surfaced while running a session.
///
/// Per the protocol's error-propagation policy, `Session::run` itself
/// never returns one of these to its caller on a frame-level fault — it
/// logs, closes, and returns `Ok(())`. This type exists for the pieces of
/// the session that *do* need to report failure directly: construction
/// (the handshake) and explicit sends.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The handshake failed before the session reached `Ready`.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// A frame failed to decode or violated a framing invariant.
    #[error(transparent)]
    Malformed(#[from] ProtoError),

    /// A registered handler reported failure while processing a message.
    #[error("handler failed for opcode {opcode:#06x}: {reason}")]
    HandlerFailure {
        /// Opcode being dispatched when the handler failed.
        opcode: u16,
        /// Handler-supplied failure description.
        reason: String,
    },

    /// The transport failed or closed unexpectedly.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl From<WriteFrameError> for SessionError {
    fn from(err: WriteFrameError) -> Self {
        match err {
            WriteFrameError::Malformed(e) => Self::Malformed(e),
            WriteFrameError::Transport(e) => Self::Transport(e),
        }
    }
}
