//! Protocol state (C4): negotiated options, the derived session key and
//! seeds, and the top-level session phase.

use bitflags::bitflags;
use silk_proto::frame::FrameCipher;
use silk_proto::{BlowfishCipher, ByteGenerator};
use zeroize::Zeroizing;

use crate::kdf::DerivedKeys;

bitflags! {
    /// Negotiated protocol features. Zero initially; set during the
    /// handshake's first SETUP frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProtocolOptions: u8 {
        /// Frames are Blowfish-encrypted.
        const ENCRYPTION = 0b0001;
        /// Count/CRC tags are validated on decode.
        const ERROR_DETECTION = 0b0010;
        /// Key exchange (the DH exchange itself) is performed.
        const KEY_EXCHANGE = 0b0100;
        /// Challenge/response tags are exchanged and verified.
        const KEY_CHALLENGE = 0b1000;
    }
}

/// Top-level handshake/session phase (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Initiator: waiting for the Responder's opening SETUP frame.
    WaitSetup,
    /// Responder: handshake started, awaiting the Initiator's response.
    HandshakeBegin,
    /// Either role: challenge/response tags exchanged, awaiting final ack.
    HandshakeChallenge,
    /// Handshake complete; the session accepts and emits application
    /// messages.
    Ready,
    /// The session has been torn down.
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionPhase::WaitSetup => "WaitSetup",
            SessionPhase::HandshakeBegin => "HandshakeBegin",
            SessionPhase::HandshakeChallenge => "HandshakeChallenge",
            SessionPhase::Ready => "Ready",
            SessionPhase::Closed => "Closed",
        };
        f.write_str(s)
    }
}

/// The 8-byte Blowfish session key, held zeroized-on-drop while in transit
/// between derivation and installation into the frame cipher.
pub struct SessionKey(Zeroizing<[u8; 8]>);

impl SessionKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub fn new(bytes: [u8; 8]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Borrows the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

/// Protocol state for one session: which role, which options are active,
/// the handshake/session phase, and the frame cipher context the codec
/// mutates on every encode/decode.
pub struct ProtocolState {
    phase: SessionPhase,
    options: ProtocolOptions,
    cipher: FrameCipher,
}

impl ProtocolState {
    /// Creates state for a fresh, unkeyed session in `initial_phase`
    /// (`WaitSetup` for an Initiator, `HandshakeBegin` for a Responder).
    #[must_use]
    pub fn new(initial_phase: SessionPhase) -> Self {
        Self { phase: initial_phase, options: ProtocolOptions::empty(), cipher: FrameCipher::disabled() }
    }

    /// Current session phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Transitions to a new phase.
    pub fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
    }

    /// Currently negotiated options.
    #[must_use]
    pub fn options(&self) -> ProtocolOptions {
        self.options
    }

    /// Records the options the handshake negotiated. Called once, from the
    /// first SETUP frame.
    pub fn set_options(&mut self, options: ProtocolOptions) {
        self.options = options;
        self.cipher.error_detection = options.contains(ProtocolOptions::ERROR_DETECTION);
    }

    /// Read access to the frame cipher context the codec operates over.
    #[must_use]
    pub fn cipher(&self) -> &FrameCipher {
        &self.cipher
    }

    /// Mutable access to the frame cipher context.
    pub fn cipher_mut(&mut self) -> &mut FrameCipher {
        &mut self.cipher
    }

    /// Installs the derived session key and seeds, and turns on
    /// encryption. Called once, when the handshake computes the shared
    /// secret.
    pub fn install_key_material(&mut self, keys: DerivedKeys) {
        let key = SessionKey::new(keys.session_key);
        self.cipher.blowfish = Some(BlowfishCipher::new(key.as_bytes()));
        self.cipher.crc_seed = keys.crc_seed;
        self.cipher.send_count = ByteGenerator::new(keys.count_seed);
        self.cipher.recv_count = ByteGenerator::new(keys.count_seed);
        self.cipher.encryption = self.options.contains(ProtocolOptions::ENCRYPTION);
        // `key` drops here, zeroizing the transient copy; the installed
        // Blowfish cipher holds its own expanded key schedule, not these
        // raw bytes.
    }

    /// Whether the session has reached `Ready` with a session key present
    /// iff encryption is active (the invariant from §3).
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if self.phase != SessionPhase::Ready {
            return true;
        }
        self.cipher.encryption == self.cipher.blowfish.is_some()
    }

    /// Tears the session down: clears key material and transitions to
    /// `Closed`. Idempotent.
    pub fn close(&mut self) {
        self.cipher.blowfish = None;
        self.cipher.encryption = false;
        self.phase = SessionPhase::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_no_key() {
        let state = ProtocolState::new(SessionPhase::WaitSetup);
        assert!(state.cipher().blowfish.is_none());
        assert!(state.is_consistent());
    }

    #[test]
    fn install_key_material_turns_on_encryption_when_negotiated() {
        let mut state = ProtocolState::new(SessionPhase::HandshakeBegin);
        state.set_options(ProtocolOptions::ENCRYPTION | ProtocolOptions::ERROR_DETECTION);
        state.install_key_material(DerivedKeys { session_key: [1; 8], count_seed: 1, crc_seed: 2 });
        assert!(state.cipher().encryption);
        assert!(state.cipher().blowfish.is_some());
    }

    #[test]
    fn close_clears_key_material() {
        let mut state = ProtocolState::new(SessionPhase::HandshakeBegin);
        state.set_options(ProtocolOptions::ENCRYPTION);
        state.install_key_material(DerivedKeys { session_key: [1; 8], count_seed: 1, crc_seed: 2 });
        state.set_phase(SessionPhase::Ready);
        state.close();
        assert_eq!(state.phase(), SessionPhase::Closed);
        assert!(state.cipher().blowfish.is_none());
    }
}
