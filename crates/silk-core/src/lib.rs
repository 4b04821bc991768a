//! Protocol state and the handshake state machine for the Silkroad session
//! protocol: negotiated options, the derived session key and seeds, and
//! the two handshake roles (Responder, Initiator) that bring a session
//! from a bare transport to `Ready`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dh;
pub mod env;
pub mod error;
pub mod handshake;
pub mod io;
pub mod kdf;
pub mod state;

pub use env::Environment;
pub use error::HandshakeError;
pub use handshake::{initiate, respond, HandshakeConfig};
pub use io::WriteFrameError;
pub use state::{ProtocolOptions, ProtocolState, SessionKey, SessionPhase};
