//! Opcode identifiers.
//!
//! Opcodes are plain `u16` values. Application-level opcode assignment is
//! out of scope here; this module only reserves the two values the core
//! itself interprets.

/// A 16-bit message-type tag.
pub type Opcode = u16;

/// The handshake opcode. All four SETUP-phase frames (§4.4) share this
/// opcode; the handshake roles distinguish frames by position in the
/// exchange and by payload shape, not by a separate opcode per step.
pub const SETUP: Opcode = 0x5001;

/// Fragmented-message envelope opcode (§4.5).
pub const MASSIVE: Opcode = 0x5000;
