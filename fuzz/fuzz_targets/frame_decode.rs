//! Fuzz target for the frame codec's `decode`.
//!
//! Feeds arbitrary bytes as a raw `size:u16` header plus body through
//! `decode` under every combination of the `encryption`/`error_detection`
//! options. `decode` must never panic; all malformed input is rejected
//! with a `ProtoError`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use silk_proto::cipher::{BlowfishCipher, ByteGenerator};
use silk_proto::frame::{decode, FrameCipher, MessageSize};

const FIXED_KEY: [u8; 8] = *b"fuzzkey!";

fn cipher_for(encryption: bool, error_detection: bool) -> FrameCipher {
    FrameCipher {
        encryption,
        error_detection,
        blowfish: if encryption { Some(BlowfishCipher::new(&FIXED_KEY)) } else { None },
        crc_seed: 0x5A,
        send_count: ByteGenerator::new(0x10),
        recv_count: ByteGenerator::new(0x10),
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let size = MessageSize::parse(u16::from_le_bytes([data[0], data[1]]));
    let body = &data[2..];

    for encryption in [false, true] {
        for error_detection in [false, true] {
            let mut cipher = cipher_for(encryption, error_detection);
            let _ = decode(size, body, &mut cipher);
        }
    }
});
