//! MASSIVE multi-frame reassembly: splits an oversized [`Message`] into a
//! header frame plus N data frames on send, and reassembles the same shape
//! back into a single `Message` on receive.

use crate::error::ProtoError;
use crate::message::{Message, PAYLOAD_MAX};
use crate::opcode::{Opcode, MASSIVE};

/// Header frame payload: `[flag:u8 = 1][chunks:u16][inner_opcode:u16]`.
const HEADER_FLAG: u8 = 1;
/// Data frame payload: `[flag:u8 = 0][bytes..]`.
const DATA_FLAG: u8 = 0;

/// Bytes of actual data a MASSIVE data frame can carry: one less than
/// `PAYLOAD_MAX` to leave room for the flag byte.
const DATA_CHUNK_LEN: usize = PAYLOAD_MAX - 1;

/// Splits `message` into the MASSIVE frame sequence: one header `Message`
/// followed by the ordered data chunk `Message`s. Every returned `Message`
/// carries the `MASSIVE` opcode; `message`'s own opcode is carried inside
/// the header payload as `inner_opcode`.
#[must_use]
pub fn split(message: &Message) -> Vec<Message> {
    let payload = message.as_data_span();
    let chunks = payload.chunks(DATA_CHUNK_LEN);
    let chunk_count = chunks.len() as u16;

    let mut header = Message::new(MASSIVE);
    header.write_u8(HEADER_FLAG);
    header.write_u16(chunk_count);
    header.write_u16(message.id());

    let mut out = Vec::with_capacity(1 + chunk_count as usize);
    out.push(header);
    for chunk in payload.chunks(DATA_CHUNK_LEN) {
        let mut data = Message::new(MASSIVE);
        data.write_u8(DATA_FLAG);
        data.write_bytes(chunk);
        out.push(data);
    }
    out
}

/// Reassembly state held by the session loop across frames of one
/// connection.
#[derive(Debug, Default)]
pub struct Reassembler {
    partial: Option<Message>,
    inner_opcode: Opcode,
    remaining: u16,
}

/// Outcome of feeding one frame into the reassembler.
pub enum Fed {
    /// The frame was not part of a MASSIVE sequence; deliver it as-is.
    Deliver(Message),
    /// A MASSIVE header or data chunk was consumed; no complete message
    /// yet.
    Pending,
    /// The final data chunk of a MASSIVE sequence arrived; the reassembled
    /// message is ready for dispatch.
    Complete(Message),
}

impl Reassembler {
    /// Creates an empty reassembler (no partial message in flight).
    #[must_use]
    pub fn new() -> Self {
        Self { partial: None, inner_opcode: 0, remaining: 0 }
    }

    /// Feeds one decoded frame into the reassembler.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::MassiveViolation`] for any of the violations
    /// enumerated in the protocol design: a non-MASSIVE frame arriving
    /// mid-sequence, a header arriving mid-sequence, or a data chunk
    /// arriving with no sequence in progress.
    #[allow(clippy::expect_used)]
    pub fn feed(&mut self, frame: Message) -> Result<Fed, ProtoError> {
        if frame.id() != MASSIVE {
            if self.partial.is_some() {
                return Err(ProtoError::MassiveViolation(
                    "non-MASSIVE frame received with a MASSIVE sequence in progress",
                ));
            }
            return Ok(Fed::Deliver(frame));
        }

        let mut frame = frame;
        let flag = frame.read_u8()?;
        match flag {
            f if f == HEADER_FLAG => {
                if self.partial.is_some() {
                    return Err(ProtoError::MassiveViolation(
                        "MASSIVE header received with a sequence already in progress",
                    ));
                }
                let chunks = frame.read_u16()?;
                let inner_opcode = frame.read_u16()?;
                self.inner_opcode = inner_opcode;
                self.remaining = chunks;
                self.partial = Some(Message::new(inner_opcode));
                if chunks == 0 {
                    let done = self.partial.take().expect("just inserted");
                    return Ok(Fed::Complete(done));
                }
                Ok(Fed::Pending)
            },
            f if f == DATA_FLAG => {
                let Some(partial) = self.partial.as_mut() else {
                    return Err(ProtoError::MassiveViolation(
                        "MASSIVE data chunk received with no sequence in progress",
                    ));
                };
                if self.remaining == 0 {
                    return Err(ProtoError::MassiveViolation(
                        "MASSIVE data chunk received after the declared chunk count was met",
                    ));
                }
                let rest_len = frame.remaining();
                let bytes = frame.read_bytes(rest_len)?;
                partial.as_data_span_mut().extend_from_slice(bytes);
                self.remaining -= 1;
                if self.remaining == 0 {
                    let done = self.partial.take().expect("invariant: partial is Some here");
                    Ok(Fed::Complete(done))
                } else {
                    Ok(Fed::Pending)
                }
            },
            _ => Err(ProtoError::MassiveViolation("MASSIVE frame with unrecognized flag byte")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_then_reassemble_round_trips() {
        let mut msg = Message::new(0x77);
        msg.write_bytes(&vec![0xABu8; 5000]);

        let frames = split(&msg);
        // header + ceil(5000 / 4088) = header + 2
        assert_eq!(frames.len(), 3);

        let mut reassembler = Reassembler::new();
        let mut result = None;
        for frame in frames {
            match reassembler.feed(frame).unwrap() {
                Fed::Complete(m) => result = Some(m),
                Fed::Pending | Fed::Deliver(_) => {},
            }
        }
        let result = result.expect("sequence completed");
        assert_eq!(result.id(), 0x77);
        assert_eq!(result.as_data_span(), msg.as_data_span());
    }

    #[test]
    fn chunk_sizes_match_concrete_scenario() {
        let mut msg = Message::new(0xBEEF);
        msg.write_bytes(&vec![0u8; 5000]);
        let frames = split(&msg);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].as_data_span().len(), 1 + 4088);
        assert_eq!(frames[2].as_data_span().len(), 1 + 912);
    }

    #[test]
    fn non_massive_frame_delivers_directly() {
        let msg = Message::new(0x42);
        let mut reassembler = Reassembler::new();
        match reassembler.feed(msg).unwrap() {
            Fed::Deliver(m) => assert_eq!(m.id(), 0x42),
            _ => panic!("expected direct delivery"),
        }
    }

    #[test]
    fn two_headers_in_a_row_is_a_violation() {
        let mut header = Message::new(MASSIVE);
        header.write_u8(HEADER_FLAG);
        header.write_u16(2);
        header.write_u16(0x10);

        let mut reassembler = Reassembler::new();
        assert!(matches!(reassembler.feed(header.clone()).unwrap(), Fed::Pending));
        assert!(reassembler.feed(header).is_err());
    }

    #[test]
    fn data_chunk_without_header_is_a_violation() {
        let mut data = Message::new(MASSIVE);
        data.write_u8(DATA_FLAG);
        data.write_bytes(b"stray");
        let mut reassembler = Reassembler::new();
        assert!(reassembler.feed(data).is_err());
    }
}
