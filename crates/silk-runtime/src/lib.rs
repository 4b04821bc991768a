//! The session loop and handler registry that turn [`silk_core`]'s
//! handshake and [`silk_proto`]'s framing into a runnable session over an
//! already-connected transport.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod registry;
pub mod session;

pub use error::SessionError;
pub use registry::{Handler, HandlerRegistry, Service};
pub use session::{Session, SessionHandle};
