//! The session loop (C6): owns the transport, drives the handshake,
//! then loops decode → MASSIVE reassembly → dispatch, with a serialized
//! send path.

use std::sync::Arc;

use silk_core::handshake::{initiate, respond, HandshakeConfig};
use silk_core::io::{read_frame, write_frame};
use silk_core::{Environment, ProtocolState, SessionPhase};
use silk_proto::massive::{split as split_massive, Fed, Reassembler};
use silk_proto::Message;
use tokio::io::{split as split_transport, AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::SessionError;
use crate::registry::HandlerRegistry;

/// A cloneable handle to a session's send path and protocol state, given
/// to handlers so they can reply or disconnect.
///
/// Sends are serialized: the write half and the protocol state (whose
/// cipher context a send must mutate) are locked together for the
/// duration of one frame's encode + write, so two concurrent `send` calls
/// never interleave bytes on the wire.
pub struct SessionHandle<T> {
    writer: Arc<Mutex<WriteHalf<T>>>,
    state: Arc<Mutex<ProtocolState>>,
}

impl<T> Clone for SessionHandle<T> {
    fn clone(&self) -> Self {
        Self { writer: Arc::clone(&self.writer), state: Arc::clone(&self.state) }
    }
}

impl<T: AsyncWrite + Unpin + Send> SessionHandle<T> {
    /// Sends one message. If `msg.massive` is set, fragments it into the
    /// MASSIVE header + data chunk sequence first; every chunk goes out
    /// under the same lock so the sequence can't be interrupted by
    /// another `send`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] on I/O failure, or
    /// [`SessionError::Malformed`] if a message exceeds `PAYLOAD_MAX`.
    pub async fn send(&self, msg: &Message) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        let mut writer = self.writer.lock().await;
        if msg.massive {
            for frame in split_massive(msg) {
                write_frame(&mut *writer, &frame, state.cipher_mut()).await?;
            }
        } else {
            write_frame(&mut *writer, msg, state.cipher_mut()).await?;
        }
        Ok(())
    }

    /// Idempotent disconnect: marks the protocol state `Closed`, clears
    /// key material, and shuts down the write half so the peer observes
    /// end-of-stream. Safe to call more than once or concurrently with the
    /// run loop's own close-on-fault path.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if state.phase() == SessionPhase::Closed {
            return;
        }
        state.close();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    /// Current session phase, mostly useful for tests and diagnostics.
    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase()
    }
}

/// One session: a handshake-completed transport, its handler registry,
/// and MASSIVE reassembly state.
pub struct Session<T> {
    reader: ReadHalf<T>,
    handle: SessionHandle<T>,
    registry: HandlerRegistry<T>,
    reassembler: Reassembler,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Accepts an already-connected transport as the Responder: runs the
    /// handshake, then returns a session ready to `run`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Handshake`] if the setup exchange fails.
    pub async fn accept<E: Environment>(
        mut transport: T,
        config: HandshakeConfig,
        env: &E,
        registry: HandlerRegistry<T>,
    ) -> Result<Self, SessionError> {
        let state = respond(&mut transport, config, env).await?;
        Ok(Self::from_parts(transport, state, registry))
    }

    /// Dials out on an already-connected transport as the Initiator.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Handshake`] if the setup exchange fails.
    pub async fn dial<E: Environment>(
        mut transport: T,
        env: &E,
        registry: HandlerRegistry<T>,
    ) -> Result<Self, SessionError> {
        let state = initiate(&mut transport, env).await?;
        Ok(Self::from_parts(transport, state, registry))
    }

    fn from_parts(transport: T, state: ProtocolState, registry: HandlerRegistry<T>) -> Self {
        let (reader, writer) = split_transport(transport);
        let handle = SessionHandle { writer: Arc::new(Mutex::new(writer)), state: Arc::new(Mutex::new(state)) };
        Self { reader, handle, registry, reassembler: Reassembler::new() }
    }

    /// A cloneable handle for sending/disconnecting from outside the run
    /// loop (e.g. from a handler that stashes it to reply later).
    #[must_use]
    pub fn handle(&self) -> SessionHandle<T> {
        self.handle.clone()
    }

    /// Runs the receive → reassemble → dispatch loop until clean
    /// end-of-stream or a fatal protocol fault, then returns. Per the
    /// protocol's error-propagation policy, frame-level and handler
    /// faults are never returned here — they close the session and this
    /// always returns `Ok(())`. Only a failure to even begin running
    /// (already closed) is surfaced as an error.
    pub async fn run(mut self) -> Result<(), SessionError> {
        loop {
            let decoded = {
                let mut state = self.handle.state.lock().await;
                read_frame(&mut self.reader, state.cipher_mut()).await
            };
            let frame = match decoded {
                Ok(None) => {
                    info!("session received clean end-of-stream");
                    break;
                },
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "malformed frame, closing session");
                    break;
                },
                Err(e) => {
                    warn!(error = %e, "transport error, closing session");
                    break;
                },
                Ok(Some(Ok(frame))) => frame,
            };

            let fed = match self.reassembler.feed(frame) {
                Ok(fed) => fed,
                Err(e) => {
                    warn!(error = %e, "MASSIVE reassembly violation, closing session");
                    break;
                },
            };
            let message = match fed {
                Fed::Pending => continue,
                Fed::Deliver(m) | Fed::Complete(m) => m,
            };

            if let Err(e) = self.dispatch(&message).await {
                error!(error = %e, "handler failed, closing session");
                break;
            }
        }
        self.handle.disconnect().await;
        Ok(())
    }

    async fn dispatch(&self, message: &Message) -> Result<(), SessionError> {
        let Some(handlers) = self.registry.handlers_for(message.id()) else {
            return Ok(());
        };
        for handler in handlers {
            handler.handle(&self.handle, message).await.map_err(|reason| {
                SessionError::HandlerFailure { opcode: message.id(), reason }
            })?;
        }
        Ok(())
    }
}
