//! Framed RCON codec (spec.md §4.1).
//!
//! Encodes/decodes the length-prefixed Source-RCON-style packet used to
//! talk to a Squad dedicated server: `size: i32 LE` (byte count of
//! everything after `size` itself), `id: i32 LE`, `type: i32 LE`,
//! `body: null-terminated utf8`, then a single trailing pad byte.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::RconError;

/// `SERVERDATA_AUTH`
pub const TYPE_AUTH: i32 = 3;
/// `SERVERDATA_AUTH_RESPONSE` / `SERVERDATA_EXECCOMMAND` (same wire value).
pub const TYPE_AUTH_RESPONSE_OR_EXECCOMMAND: i32 = 2;
/// `SERVERDATA_RESPONSE_VALUE`
pub const TYPE_RESPONSE_VALUE: i32 = 0;
/// Custom type the game uses to push unsolicited chat/kill-feed/admin events.
pub const TYPE_EVENT: i32 = 1;

const HEADER_AND_TERMINATORS_LEN: usize = 10; // id(4) + type(4) + null(1) + pad(1)
const DEFAULT_MAX_PACKET_SIZE: usize = 4096;

/// One RCON packet: `{ id, type, body }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn is_event(&self) -> bool {
        self.kind == TYPE_EVENT
    }
}

/// Stateless framed codec for a single RCON connection. Framing is
/// chunk-boundary agnostic: `decode` returns `Ok(None)` until a full
/// frame is buffered, regardless of how TCP happened to split it.
#[derive(Debug, Clone, Copy)]
pub struct RconCodec {
    max_packet_size: usize,
}

impl RconCodec {
    pub fn new() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }

    pub fn with_max_packet_size(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }
}

impl Default for RconCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<Packet> for RconCodec {
    type Error = RconError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body_bytes = packet.body.as_bytes();
        let remainder_len = HEADER_AND_TERMINATORS_LEN + body_bytes.len();
        dst.reserve(4 + remainder_len);
        dst.put_i32_le(remainder_len as i32);
        dst.put_i32_le(packet.id);
        dst.put_i32_le(packet.kind);
        dst.put_slice(body_bytes);
        dst.put_u8(0); // null terminator for body
        dst.put_u8(0); // pad byte
        Ok(())
    }
}

impl Decoder for RconCodec {
    type Item = Packet;
    type Error = RconError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let size = i32::from_le_bytes(src[0..4].try_into().unwrap());
        if size < HEADER_AND_TERMINATORS_LEN as i32 || size as usize > self.max_packet_size {
            return Err(RconError::Malformed(format!(
                "declared frame size {size} out of bounds [{HEADER_AND_TERMINATORS_LEN}, {}]",
                self.max_packet_size
            )));
        }
        let size = size as usize;

        // Need the 4-byte size prefix plus `size` bytes of remainder.
        if src.len() < 4 + size {
            src.reserve(4 + size - src.len());
            return Ok(None);
        }

        src.advance(4);
        let mut frame = src.split_to(size);

        if frame.len() < HEADER_AND_TERMINATORS_LEN {
            return Err(RconError::ShortRead);
        }

        let id = frame.get_i32_le();
        let kind = frame.get_i32_le();
        // Remaining bytes are body + null terminator + pad (+ any trailing
        // garbage within the declared size, which spec.md §4.1 says to
        // discard).
        let body_region = &frame[..];
        let null_pos = body_region
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| RconError::Malformed("body missing null terminator".into()))?;
        let body = String::from_utf8(body_region[..null_pos].to_vec())
            .map_err(|e| RconError::Malformed(format!("body is not valid utf8: {e}")))?;

        Ok(Some(Packet { id, kind, body }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_packets() {
        let mut codec = RconCodec::new();
        let mut buf = BytesMut::new();
        let packet = Packet::new(7, TYPE_RESPONSE_VALUE, "PartA");
        codec.encode(packet.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, packet);
        assert!(buf.is_empty());
    }

    #[test]
    fn round_trips_empty_body() {
        let mut codec = RconCodec::new();
        let mut buf = BytesMut::new();
        let packet = Packet::new(-1, TYPE_AUTH_RESPONSE_OR_EXECCOMMAND, "");
        codec.encode(packet.clone(), &mut buf).unwrap();
        assert_eq!(buf.len(), 4 + HEADER_AND_TERMINATORS_LEN);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn is_stable_across_arbitrary_chunk_boundaries() {
        let mut codec = RconCodec::new();
        let mut encode_buf = BytesMut::new();
        let packet = Packet::new(42, TYPE_RESPONSE_VALUE, "hello world");
        codec.encode(packet.clone(), &mut encode_buf).unwrap();
        let whole = encode_buf.to_vec();

        // Feed the encoded bytes one at a time; decode must only succeed
        // once the whole frame has arrived.
        let mut buf = BytesMut::new();
        let mut decoded = None;
        for (i, byte) in whole.iter().enumerate() {
            buf.put_u8(*byte);
            let result = codec.decode(&mut buf).unwrap();
            if let Some(p) = result {
                decoded = Some(p);
                assert_eq!(i, whole.len() - 1, "decoded before last byte arrived");
                break;
            }
        }
        assert_eq!(decoded, Some(packet));
    }

    #[test]
    fn rejects_oversized_frames() {
        let mut codec = RconCodec::with_max_packet_size(16);
        let mut buf = BytesMut::new();
        buf.put_i32_le(4096);
        buf.put_bytes(0, 4096);
        assert!(matches!(codec.decode(&mut buf), Err(RconError::Malformed(_))));
    }

    #[test]
    fn rejects_undersized_frames() {
        let mut codec = RconCodec::new();
        let mut buf = BytesMut::new();
        buf.put_i32_le(4);
        buf.put_bytes(0, 4);
        assert!(matches!(codec.decode(&mut buf), Err(RconError::Malformed(_))));
    }

    #[test]
    fn discards_trailing_bytes_after_null_within_declared_size() {
        // Declares a size larger than id+type+null+pad would need, with
        // garbage after the body's null terminator.
        let mut codec = RconCodec::new();
        let mut buf = BytesMut::new();
        let remainder: Vec<u8> = {
            let mut v = Vec::new();
            v.extend_from_slice(&7i32.to_le_bytes());
            v.extend_from_slice(&TYPE_RESPONSE_VALUE.to_le_bytes());
            v.extend_from_slice(b"hi\0garbage\0");
            v
        };
        buf.put_i32_le(remainder.len() as i32);
        buf.put_slice(&remainder);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.body, "hi");
    }

    #[test]
    fn round_trip_property_for_bodies_up_to_4086_bytes() {
        let mut codec = RconCodec::new();
        for len in [0usize, 1, 255, 4086] {
            let mut buf = BytesMut::new();
            let body = "a".repeat(len);
            let packet = Packet::new(1, TYPE_RESPONSE_VALUE, body);
            codec.encode(packet.clone(), &mut buf).unwrap();
            let decoded = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded, packet);
        }
    }
}
