//! Fuzz target for `Message`'s typed read cursor.
//!
//! Builds a message from arbitrary payload bytes, then drives an arbitrary
//! sequence of typed reads against it. Every read either succeeds or
//! returns `ProtoError::Overrun`; it must never panic or read out of
//! bounds.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use silk_proto::Message;

#[derive(Debug, Arbitrary)]
enum ReadOp {
    U8,
    U16,
    U32,
    U64,
    Str,
    Bytes(u16),
}

#[derive(Debug, Arbitrary)]
struct Input {
    payload: Vec<u8>,
    ops: Vec<ReadOp>,
}

fuzz_target!(|input: Input| {
    let mut msg = Message::from_payload(0x1234, input.payload);
    for op in input.ops {
        match op {
            ReadOp::U8 => {
                let _ = msg.read_u8();
            },
            ReadOp::U16 => {
                let _ = msg.read_u16();
            },
            ReadOp::U32 => {
                let _ = msg.read_u32();
            },
            ReadOp::U64 => {
                let _ = msg.read_u64();
            },
            ReadOp::Str => {
                let _ = msg.read_str();
            },
            ReadOp::Bytes(n) => {
                let _ = msg.read_bytes(n as usize);
            },
        }
    }
});
