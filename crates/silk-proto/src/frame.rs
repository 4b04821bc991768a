//! The frame codec (C3): encodes and decodes a single wire frame.
//!
//! ```text
//! [ size:u16 ] [ opcode:u16 ] [ count:u8 ] [ crc:u8 ] [ payload: data_size bytes ]
//! ```
//!
//! `opcode|count|crc|payload` together form the *encrypt region*. When
//! encryption is active, that region (padded to a Blowfish block multiple)
//! replaces the plaintext bytes on the wire and the size header's top bit
//! is set.

use crate::cipher::{padded_len, checksum_byte, BlowfishCipher, ByteGenerator};
use crate::error::ProtoError;
use crate::message::{Message, PAYLOAD_MAX};
use crate::opcode::Opcode;

/// Top bit of the 16-bit size header marks the frame as encrypted.
const ENCRYPTED_BIT: u16 = 0x8000;
/// Remaining 15 bits are the plaintext `data_size`.
const SIZE_MASK: u16 = 0x7FFF;

/// Fixed-size portion of the encrypt region that precedes the payload:
/// `opcode (2) + count (1) + crc (1)`.
const ENVELOPE_PREFIX_LEN: usize = 4;

/// The mutable per-connection cipher context a frame codec needs: whether
/// encryption/error-detection are active, the session Blowfish cipher (once
/// installed), and the independent send/receive count-byte generators.
///
/// Owned by `silk-core`'s `ProtocolState`, but defined here so the codec
/// has no dependency on the handshake/session-state crate.
pub struct FrameCipher {
    /// Whether frames are Blowfish-encrypted.
    pub encryption: bool,
    /// Whether the count/crc tags are validated on decode.
    pub error_detection: bool,
    /// Installed once the handshake derives a session key.
    pub blowfish: Option<BlowfishCipher>,
    /// Seed used to recompute `crc_byte` each frame (stateless, parameter-only).
    pub crc_seed: u8,
    /// Advances once per frame this side encodes.
    pub send_count: ByteGenerator,
    /// Advances once per frame this side decodes.
    pub recv_count: ByteGenerator,
}

impl FrameCipher {
    /// A context with no active options, e.g. before the handshake installs
    /// a key (or for the trivial no-options handshake where both sides stay
    /// plaintext for the session's lifetime).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            encryption: false,
            error_detection: false,
            blowfish: None,
            crc_seed: 0,
            send_count: ByteGenerator::new(0),
            recv_count: ByteGenerator::new(0),
        }
    }
}

/// Encodes `message` into wire bytes using `cipher`'s current options.
///
/// # Errors
///
/// Returns [`ProtoError::PayloadTooLarge`] if the payload exceeds
/// [`PAYLOAD_MAX`].
#[allow(clippy::expect_used)]
pub fn encode(message: &Message, cipher: &mut FrameCipher) -> Result<Vec<u8>, ProtoError> {
    let payload = message.as_data_span();
    let data_size = payload.len();
    if data_size > PAYLOAD_MAX {
        return Err(ProtoError::PayloadTooLarge { size: data_size, max: PAYLOAD_MAX });
    }

    let count = if cipher.error_detection { cipher.send_count.advance() } else { 0 };
    let mut envelope = Vec::with_capacity(ENVELOPE_PREFIX_LEN + data_size);
    envelope.extend_from_slice(&message.id().to_le_bytes());
    envelope.push(count);
    envelope.push(0); // crc placeholder, rewritten below
    envelope.extend_from_slice(payload);
    if cipher.error_detection {
        envelope[3] = checksum_byte(&envelope, cipher.crc_seed);
    }

    let mut out = Vec::with_capacity(2 + padded_len(envelope.len()).max(envelope.len()));
    if cipher.encryption {
        let bf = cipher
            .blowfish
            .as_ref()
            .expect("invariant: encryption active implies a Blowfish key is installed");
        let padded = padded_len(envelope.len());
        envelope.resize(padded, 0);
        bf.encrypt(&mut envelope);
        let size_header = (data_size as u16 & SIZE_MASK) | ENCRYPTED_BIT;
        out.extend_from_slice(&size_header.to_le_bytes());
        out.extend_from_slice(&envelope);
    } else {
        let size_header = data_size as u16 & SIZE_MASK;
        out.extend_from_slice(&size_header.to_le_bytes());
        out.extend_from_slice(&envelope);
    }
    Ok(out)
}

/// Parsed size header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSize {
    /// Plaintext payload length in bytes.
    pub data_size: u16,
    /// Whether the following encrypt region is Blowfish-encrypted.
    pub encrypted: bool,
}

impl MessageSize {
    /// Parses a 16-bit little-endian size header.
    #[must_use]
    pub fn parse(raw: u16) -> Self {
        Self { data_size: raw & SIZE_MASK, encrypted: raw & ENCRYPTED_BIT != 0 }
    }

    /// Number of bytes that follow the 2-byte size header on the wire: the
    /// encrypt region, padded to a Blowfish block multiple when encrypted.
    #[must_use]
    pub fn wire_body_len(&self) -> usize {
        let es = self.data_size as usize + ENVELOPE_PREFIX_LEN;
        if self.encrypted { padded_len(es) } else { es }
    }
}

/// Decodes a frame body (everything after the 2-byte size header) into a
/// [`Message`].
///
/// `size` must be the already-parsed header; `body` must be exactly
/// `size.wire_body_len()` bytes (the caller — the session loop — is
/// responsible for reading that many bytes off the transport first).
///
/// # Errors
///
/// - [`ProtoError::EncryptionMismatch`] if `size.encrypted` disagrees with
///   `cipher.encryption`.
/// - [`ProtoError::BufferTooShort`] if `body` is shorter than required.
/// - [`ProtoError::TagMismatch`] if error detection is active and the count
///   or crc byte don't match the expected sequence.
#[allow(clippy::expect_used)]
pub fn decode(size: MessageSize, body: &[u8], cipher: &mut FrameCipher) -> Result<Message, ProtoError> {
    if size.encrypted != cipher.encryption {
        return Err(ProtoError::EncryptionMismatch {
            frame_encrypted: size.encrypted,
            session_encrypted: cipher.encryption,
        });
    }
    let need = size.wire_body_len();
    if body.len() < need {
        return Err(ProtoError::BufferTooShort { need, have: body.len() });
    }
    let body = &body[..need];

    let plain_storage;
    let envelope: &[u8] = if size.encrypted {
        let bf = cipher
            .blowfish
            .as_ref()
            .expect("invariant: encryption active implies a Blowfish key is installed");
        plain_storage = {
            let mut buf = body.to_vec();
            bf.decrypt(&mut buf);
            buf
        };
        &plain_storage
    } else {
        body
    };

    let es = size.data_size as usize + ENVELOPE_PREFIX_LEN;
    if envelope.len() < es {
        return Err(ProtoError::BufferTooShort { need: es, have: envelope.len() });
    }

    let opcode = Opcode::from_le_bytes([envelope[0], envelope[1]]);
    let count = envelope[2];
    let crc = envelope[3];
    let payload = &envelope[ENVELOPE_PREFIX_LEN..es];

    if cipher.error_detection {
        let expected_count = cipher.recv_count.advance();
        let mut check_envelope = Vec::with_capacity(es);
        check_envelope.extend_from_slice(&envelope[..2]);
        check_envelope.push(count);
        check_envelope.push(0);
        check_envelope.extend_from_slice(payload);
        let expected_crc = checksum_byte(&check_envelope, cipher.crc_seed);
        if count != expected_count || crc != expected_crc {
            return Err(ProtoError::TagMismatch);
        }
    }

    Ok(Message::from_payload(opcode, payload.to_vec()))
}
