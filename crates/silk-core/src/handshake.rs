//! The handshake state machine (C5), in its two roles: Responder (listens)
//! and Initiator (dials out).
//!
//! The entire SETUP exchange runs unencrypted: the shared secret that
//! would key the cipher does not exist until partway through the
//! exchange, so there is no frame in this protocol that could be
//! encrypted with it. Only once a role reaches `Ready` does the installed
//! key take effect, for the application frames that follow — the "initial
//! unencrypted SETUP frame" the framing design calls out is, in this
//! implementation, the whole handshake, not just its first frame. See
//! `DESIGN.md` for the reasoning (the alternative reading is
//! self-contradictory: a frame can't be encrypted with a key neither side
//! has derived yet).

use silk_proto::frame::FrameCipher;
use silk_proto::opcode::SETUP;
use silk_proto::Message;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, instrument};

use crate::dh::{public_value, shared_secret, G, P};
use crate::env::Environment;
use crate::error::HandshakeError;
use crate::io::{read_frame, write_frame};
use crate::kdf::{challenge_tag, derive_session_material, Role as TagRole};
use crate::state::{ProtocolOptions, ProtocolState, SessionPhase};

/// A single byte identifying the handshake wire format version.
const HANDSHAKE_ID: u8 = 1;

/// Which features the Responder wants to negotiate for this session.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeConfig {
    /// Options this Responder requests.
    pub options: ProtocolOptions,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            options: ProtocolOptions::ENCRYPTION
                | ProtocolOptions::ERROR_DETECTION
                | ProtocolOptions::KEY_EXCHANGE
                | ProtocolOptions::KEY_CHALLENGE,
        }
    }
}

async fn expect_setup<T: AsyncRead + Unpin>(
    io: &mut T,
    cipher: &mut FrameCipher,
    state: &'static str,
) -> Result<Message, HandshakeError> {
    match read_frame(io, cipher).await? {
        None => Err(HandshakeError::TransportClosed),
        Some(Err(e)) => Err(HandshakeError::Proto(e)),
        Some(Ok(msg)) if msg.id() == SETUP => Ok(msg),
        Some(Ok(msg)) => Err(HandshakeError::UnexpectedOpcode { opcode: msg.id(), state }),
    }
}

/// Drives the setup exchange as the Responder: the side that accepted an
/// inbound connection and decides which options to negotiate.
///
/// Returns protocol state transitioned to `Ready` on success.
#[instrument(skip(io, env))]
#[allow(clippy::expect_used)]
pub async fn respond<T, E>(
    io: &mut T,
    config: HandshakeConfig,
    env: &E,
) -> Result<ProtocolState, HandshakeError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    E: Environment,
{
    let mut state = ProtocolState::new(SessionPhase::HandshakeBegin);
    let mut plaintext = FrameCipher::disabled();

    let a = env.random_u32();
    let big_a = public_value(a);
    let init_seed = env.random_u32();

    let mut frame1 = Message::new(SETUP);
    frame1.write_u32(init_seed);
    frame1.write_u8(HANDSHAKE_ID);
    frame1.write_u32(P);
    frame1.write_u32(G);
    frame1.write_u32(big_a);
    frame1.write_u8(config.options.bits());
    write_frame(io, &frame1, &mut plaintext).await?;

    if config.options.is_empty() {
        let _ack = expect_setup(io, &mut plaintext, "HandshakeBegin").await?;
        state.set_phase(SessionPhase::Ready);
        debug!("handshake complete with no negotiated options");
        return Ok(state);
    }
    state.set_options(config.options);

    let mut frame2 = expect_setup(io, &mut plaintext, "HandshakeBegin").await?;
    let big_b = frame2.read_u32()?;
    let client_key: [u8; 8] = frame2.read_bytes(8)?.try_into().expect("read_bytes(8) yields 8 bytes");

    let k = shared_secret(big_b, a);
    let keys = derive_session_material(k, init_seed);
    let expected_client_key = challenge_tag(k, init_seed, TagRole::Client);
    if client_key != expected_client_key {
        return Err(HandshakeError::ChallengeMismatch);
    }
    state.install_key_material(keys);
    state.set_phase(SessionPhase::HandshakeChallenge);

    let server_key = challenge_tag(k, init_seed, TagRole::Server);
    let mut frame3 = Message::new(SETUP);
    frame3.write_bytes(&server_key);
    write_frame(io, &frame3, &mut plaintext).await?;

    let _ack = expect_setup(io, &mut plaintext, "HandshakeChallenge").await?;
    state.set_phase(SessionPhase::Ready);
    debug!("handshake complete, encryption active = {}", state.cipher().encryption);
    Ok(state)
}

/// Drives the setup exchange as the Initiator: the side that dialed out
/// and accepts whatever options the Responder proposes.
#[instrument(skip(io, env))]
#[allow(clippy::expect_used)]
pub async fn initiate<T, E>(io: &mut T, env: &E) -> Result<ProtocolState, HandshakeError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    E: Environment,
{
    let mut state = ProtocolState::new(SessionPhase::WaitSetup);
    let mut plaintext = FrameCipher::disabled();

    let mut frame1 = expect_setup(io, &mut plaintext, "WaitSetup").await?;
    let init_seed = frame1.read_u32()?;
    let _handshake_id = frame1.read_u8()?;
    let p = frame1.read_u32()?;
    let g = frame1.read_u32()?;
    let big_a = frame1.read_u32()?;
    let options = ProtocolOptions::from_bits_truncate(frame1.read_u8()?);
    debug_assert_eq!(p, P, "fixed DH field constant");
    debug_assert_eq!(g, G, "fixed DH generator constant");

    if options.is_empty() {
        let ack = Message::new(SETUP);
        write_frame(io, &ack, &mut plaintext).await?;
        state.set_phase(SessionPhase::Ready);
        debug!("handshake complete with no negotiated options");
        return Ok(state);
    }
    state.set_options(options);

    let b = env.random_u32();
    let big_b = public_value(b);
    let k = shared_secret(big_a, b);
    let keys = derive_session_material(k, init_seed);
    let client_key = challenge_tag(k, init_seed, TagRole::Client);

    let mut frame2 = Message::new(SETUP);
    frame2.write_u32(big_b);
    frame2.write_bytes(&client_key);
    write_frame(io, &frame2, &mut plaintext).await?;
    state.set_phase(SessionPhase::HandshakeChallenge);

    let mut frame3 = expect_setup(io, &mut plaintext, "HandshakeChallenge").await?;
    let server_key: [u8; 8] = frame3.read_bytes(8)?.try_into().expect("read_bytes(8) yields 8 bytes");
    let expected_server_key = challenge_tag(k, init_seed, TagRole::Server);
    if server_key != expected_server_key {
        return Err(HandshakeError::ChallengeMismatch);
    }
    state.install_key_material(keys);

    let ack = Message::new(SETUP);
    write_frame(io, &ack, &mut plaintext).await?;
    state.set_phase(SessionPhase::Ready);
    debug!("handshake complete, encryption active = {}", state.cipher().encryption);
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::SystemEnv;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[derive(Clone)]
    struct SeededEnv(std::sync::Arc<std::sync::Mutex<ChaCha8Rng>>);

    impl SeededEnv {
        fn new(seed: u64) -> Self {
            Self(std::sync::Arc::new(std::sync::Mutex::new(ChaCha8Rng::seed_from_u64(seed))))
        }
    }

    impl Environment for SeededEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            self.0.lock().expect("lock poisoned").fill_bytes(buffer);
        }
    }

    #[tokio::test]
    async fn handshake_converges_to_ready_with_matching_material() {
        let (mut client_io, mut server_io) = tokio::io::duplex(4096);
        let responder_env = SeededEnv::new(1);
        let initiator_env = SeededEnv::new(2);

        let responder = tokio::spawn(async move {
            respond(&mut server_io, HandshakeConfig::default(), &responder_env).await
        });
        let initiator = tokio::spawn(async move { initiate(&mut client_io, &initiator_env).await });

        let responder_state = responder.await.expect("task").expect("handshake");
        let initiator_state = initiator.await.expect("task").expect("handshake");

        assert_eq!(responder_state.phase(), SessionPhase::Ready);
        assert_eq!(initiator_state.phase(), SessionPhase::Ready);
        assert!(responder_state.cipher().encryption);
        assert!(initiator_state.cipher().encryption);

        // Both sides must agree on crc_seed and on the Blowfish key (checked
        // indirectly: encrypting the same plaintext block under each side's
        // installed cipher must yield identical ciphertext) and on the
        // count-byte sequence (checked by advancing each side's send/recv
        // generators in lockstep).
        assert_eq!(responder_state.cipher().crc_seed, initiator_state.cipher().crc_seed);

        let mut responder_block = *b"12345678";
        let mut initiator_block = *b"12345678";
        responder_state.cipher().blowfish.as_ref().expect("key installed").encrypt(&mut responder_block);
        initiator_state.cipher().blowfish.as_ref().expect("key installed").encrypt(&mut initiator_block);
        assert_eq!(responder_block, initiator_block);

        let mut responder_send = responder_state.cipher().send_count;
        let mut initiator_recv = initiator_state.cipher().recv_count;
        for _ in 0..16 {
            assert_eq!(responder_send.advance(), initiator_recv.advance());
        }
    }

    #[tokio::test]
    async fn handshake_with_no_options_stays_unencrypted() {
        let (mut client_io, mut server_io) = tokio::io::duplex(4096);
        let responder_env = SystemEnv::new();
        let initiator_env = SystemEnv::new();

        let config = HandshakeConfig { options: ProtocolOptions::empty() };
        let responder = tokio::spawn(async move { respond(&mut server_io, config, &responder_env).await });
        let initiator = tokio::spawn(async move { initiate(&mut client_io, &initiator_env).await });

        let responder_state = responder.await.expect("task").expect("handshake");
        let initiator_state = initiator.await.expect("task").expect("handshake");

        assert_eq!(responder_state.phase(), SessionPhase::Ready);
        assert_eq!(initiator_state.phase(), SessionPhase::Ready);
        assert!(!responder_state.cipher().encryption);
        assert!(!initiator_state.cipher().encryption);
    }

    #[tokio::test]
    async fn unexpected_opcode_before_ready_is_fatal() {
        let (mut client_io, mut server_io) = tokio::io::duplex(4096);
        let env = SystemEnv::new();

        let responder = tokio::spawn(async move {
            respond(&mut server_io, HandshakeConfig::default(), &env).await
        });

        // Send a non-SETUP opcode instead of completing the exchange.
        let mut bogus = FrameCipher::disabled();
        let msg = Message::new(0x9999);
        write_frame(&mut client_io, &msg, &mut bogus).await.unwrap();
        drop(client_io);

        let result = responder.await.expect("task");
        assert!(matches!(result, Err(HandshakeError::UnexpectedOpcode { .. })));
    }
}
