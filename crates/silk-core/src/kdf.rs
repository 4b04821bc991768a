//! Key and seed derivation from the Diffie–Hellman shared secret (§4.4,
//! §9 Open Questions).
//!
//! The reference byte schedule is proprietary and unavailable (see
//! `DESIGN.md`). This module defines one internally consistent schedule:
//! both the Blowfish session key and the `count`/`crc` seeds are bytes
//! sliced out of a single SHA-256 expansion of `K || init_seed`, and the
//! challenge/response tags are an HMAC-SHA256 over the same material.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// Length of the derived Blowfish key.
pub const SESSION_KEY_LEN: usize = 8;
/// Length of a challenge/response tag.
pub const TAG_LEN: usize = 8;

type HmacSha256 = Hmac<Sha256>;

fn expand(shared_secret: u32, init_seed: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(shared_secret.to_be_bytes());
    hasher.update(init_seed.to_be_bytes());
    hasher.finalize().into()
}

/// Derived session material: the Blowfish key plus the count/crc seeds.
#[derive(Clone, Copy)]
pub struct DerivedKeys {
    /// Raw Blowfish session key.
    pub session_key: [u8; SESSION_KEY_LEN],
    /// Seed for the per-frame count-byte generator.
    pub count_seed: u8,
    /// Seed for the checksum function.
    pub crc_seed: u8,
}

/// Derives the session key and seeds from the shared secret and
/// handshake nonce.
#[must_use]
pub fn derive_session_material(shared_secret: u32, init_seed: u32) -> DerivedKeys {
    let expanded = expand(shared_secret, init_seed);
    let mut session_key = [0u8; SESSION_KEY_LEN];
    session_key.copy_from_slice(&expanded[0..SESSION_KEY_LEN]);
    DerivedKeys { session_key, count_seed: expanded[8], crc_seed: expanded[9] }
}

/// Role byte distinguishing the client ("C") and server ("S") challenge
/// tags so `H(K, init_seed, "C") != H(K, init_seed, "S")`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The Initiator's challenge tag (`client_key`).
    Client,
    /// The Responder's challenge tag (`server_key`).
    Server,
}

impl Role {
    fn tag_byte(self) -> u8 {
        match self {
            Role::Client => b'C',
            Role::Server => b'S',
        }
    }
}

/// Computes the deterministic 8-byte challenge/response tag
/// `H(K, init_seed, role)`.
#[must_use]
#[allow(clippy::expect_used)]
pub fn challenge_tag(shared_secret: u32, init_seed: u32, role: Role) -> [u8; TAG_LEN] {
    let mut mac = HmacSha256::new_from_slice(&expand(shared_secret, init_seed))
        .expect("invariant: HMAC accepts a key of any length");
    mac.update(&[role.tag_byte()]);
    let full = mac.finalize().into_bytes();
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&full[..TAG_LEN]);
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_derive_identical_material() {
        let a = derive_session_material(42, 99);
        let b = derive_session_material(42, 99);
        assert_eq!(a.session_key, b.session_key);
        assert_eq!(a.count_seed, b.count_seed);
        assert_eq!(a.crc_seed, b.crc_seed);
    }

    #[test]
    fn client_and_server_tags_differ() {
        let client = challenge_tag(7, 8, Role::Client);
        let server = challenge_tag(7, 8, Role::Server);
        assert_ne!(client, server);
    }

    #[test]
    fn different_secrets_derive_different_keys() {
        let a = derive_session_material(1, 99);
        let b = derive_session_material(2, 99);
        assert_ne!(a.session_key, b.session_key);
    }
}
