//! Fuzz target for MASSIVE multi-frame reassembly.
//!
//! Feeds an arbitrary sequence of frames — a mix of well-formed MASSIVE
//! headers/chunks, non-MASSIVE frames, and raw garbage bytes reinterpreted
//! as a MASSIVE payload — into a single `Reassembler`. Every sequence
//! violation must surface as `ProtoError::MassiveViolation`, never a
//! panic, and the reassembler must not grow without bound for a bounded
//! input.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use silk_proto::massive::Reassembler;
use silk_proto::{Message, MASSIVE};

#[derive(Debug, Arbitrary)]
enum FuzzFrame {
    Header { chunks: u16, inner_opcode: u16 },
    Data(Vec<u8>),
    Other { opcode: u16, payload: Vec<u8> },
    RawMassive(Vec<u8>),
}

#[derive(Debug, Arbitrary)]
struct Input {
    frames: Vec<FuzzFrame>,
}

fuzz_target!(|input: Input| {
    let mut reassembler = Reassembler::new();
    for frame in input.frames {
        let msg = match frame {
            FuzzFrame::Header { chunks, inner_opcode } => {
                let mut m = Message::new(MASSIVE);
                m.write_u8(1);
                m.write_u16(chunks);
                m.write_u16(inner_opcode);
                m
            },
            FuzzFrame::Data(bytes) => {
                let mut m = Message::new(MASSIVE);
                m.write_u8(0);
                m.write_bytes(&bytes[..bytes.len().min(8192)]);
                m
            },
            FuzzFrame::Other { opcode, payload } => {
                let opcode = if opcode == MASSIVE { opcode.wrapping_add(1) } else { opcode };
                let mut m = Message::new(opcode);
                m.write_bytes(&payload[..payload.len().min(8192)]);
                m
            },
            FuzzFrame::RawMassive(bytes) => {
                let mut m = Message::new(MASSIVE);
                m.write_bytes(&bytes[..bytes.len().min(8192)]);
                m
            },
        };
        if reassembler.feed(msg).is_err() {
            // A violation tears down any partial state; keep feeding the
            // rest of the sequence against a fresh reassembler.
            reassembler = Reassembler::new();
        }
    }
});
