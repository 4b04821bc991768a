//! Wire framing, cipher primitives, and MASSIVE reassembly for the
//! Silkroad session protocol.
//!
//! This crate is pure data-in/data-out: no sockets, no async, no handshake
//! logic. The session and handshake layers compose these primitives.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod error;
pub mod frame;
pub mod massive;
pub mod message;
pub mod opcode;

pub use cipher::{BlowfishCipher, ByteGenerator};
pub use error::ProtoError;
pub use frame::{decode, encode, FrameCipher, MessageSize};
pub use massive::{Fed, Reassembler};
pub use message::{Message, PAYLOAD_MAX};
pub use opcode::{Opcode, MASSIVE, SETUP};
