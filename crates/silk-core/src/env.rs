//! Environment abstraction for deterministic handshake testing.
//!
//! Decouples the handshake's need for randomness (private DH exponents,
//! the `init_seed` nonce) from the system RNG, so tests can use a seeded
//! generator while production uses the OS CSPRNG.

/// Abstract source of randomness for the handshake.
///
/// Implementations must use cryptographically secure entropy in
/// production; the only relaxation allowed is a seeded, reproducible RNG
/// in test code.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// A random `u32`, used for DH private exponents and the `init_seed`
    /// nonce.
    fn random_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }
}

/// Production environment using the OS CSPRNG.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Creates a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - session cannot handshake securely");
    }
}
