//! # Wire Format
//!
//! Fixed 9-byte header, a 32-byte SHA-256 digest, and up to [`PAYLOAD_MAX`]
//! bytes of payload.
//!
//! ```text
//!  0                1             3 4         (PAYLOAD_MAX+36)
//! +----------------+-------------+--+-----------------+--------
//! | seq_n (4B)     | recv_buf(4B)|Fl| digest (32B)    | payload
//! +----------------+-------------+--+-----------------+--------
//! ```
//!
//! All multi-byte fields are little-endian. `Fl` bit 3 is ACK, bit 7 is FIN;
//! every other bit is reserved zero on emit and ignored on receive.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};

use crate::error::DecodeError;

/// Maximum single datagram size this transport will ever emit.
pub const DATAGRAM_MAX: usize = 1472;

/// Fixed header size: seq_n (4) + recv_buf_size (4) + flags (1).
pub const HEADER_SIZE: usize = 9;

/// SHA-256 digest size.
pub const DIGEST_SIZE: usize = 32;

/// Largest payload that fits in a single datagram.
pub const PAYLOAD_MAX: usize = DATAGRAM_MAX - HEADER_SIZE - DIGEST_SIZE;

const FLAG_ACK: u8 = 1 << 3;
const FLAG_FIN: u8 = 1 << 7;

/// A fully decoded packet: header fields plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub seq_n: u32,
    pub recv_buf_size: u32,
    pub flags: u8,
    pub payload: Bytes,
}

impl Packet {
    /// Build a plain DATA packet.
    pub fn data(seq_n: u32, recv_buf_size: u32, payload: Bytes) -> Self {
        Packet {
            seq_n,
            recv_buf_size,
            flags: 0,
            payload,
        }
    }

    /// Build a bare ACK for `seq_n` (echoes the acknowledged sequence number).
    pub fn ack(seq_n: u32) -> Self {
        Packet {
            seq_n,
            recv_buf_size: 0,
            flags: FLAG_ACK,
            payload: Bytes::new(),
        }
    }

    /// Build a FIN requesting teardown at `seq_n`.
    pub fn fin(seq_n: u32) -> Self {
        Packet {
            seq_n,
            recv_buf_size: 0,
            flags: FLAG_FIN,
            payload: Bytes::new(),
        }
    }

    /// Build a FIN-ACK (peer has seen our FIN and is tearing down too).
    pub fn fin_ack(seq_n: u32) -> Self {
        Packet {
            seq_n,
            recv_buf_size: 0,
            flags: FLAG_ACK | FLAG_FIN,
            payload: Bytes::new(),
        }
    }

    #[inline]
    pub fn is_ack(&self) -> bool {
        self.flags & FLAG_ACK != 0
    }

    #[inline]
    pub fn is_fin(&self) -> bool {
        self.flags & FLAG_FIN != 0
    }

    /// Serialize header + digest + payload.
    pub fn encode(&self) -> BytesMut {
        debug_assert!(self.payload.len() <= PAYLOAD_MAX, "payload exceeds PAYLOAD_MAX");

        let mut header = BytesMut::with_capacity(HEADER_SIZE);
        header.put_u32_le(self.seq_n);
        header.put_u32_le(self.recv_buf_size);
        header.put_u8(self.flags);

        let digest = compute_digest(&header, &self.payload);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + DIGEST_SIZE + self.payload.len());
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&digest);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse and integrity-check a raw datagram.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() < HEADER_SIZE + DIGEST_SIZE {
            return Err(DecodeError::Truncated);
        }

        let mut buf = raw;
        let seq_n = buf.get_u32_le();
        let recv_buf_size = buf.get_u32_le();
        let flags = buf.get_u8();
        let digest = &raw[HEADER_SIZE..HEADER_SIZE + DIGEST_SIZE];
        let payload = &raw[HEADER_SIZE + DIGEST_SIZE..];

        let expected = compute_digest(&raw[..HEADER_SIZE], payload);
        if expected.as_slice() != digest {
            return Err(DecodeError::Corrupt);
        }

        Ok(Packet {
            seq_n,
            recv_buf_size,
            flags,
            payload: Bytes::copy_from_slice(payload),
        })
    }
}

fn compute_digest(header: &[u8], payload: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(header);
    hasher.update(payload);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn data_packet_roundtrip() {
        let pkt = Packet::data(42, 100, Bytes::from_static(b"hello wire"));
        let encoded = pkt.encode();
        let decoded = Packet::decode(&encoded).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn ack_flag_bit_is_bit_three() {
        let pkt = Packet::ack(7);
        assert_eq!(pkt.flags, 0b0000_1000);
        assert!(pkt.is_ack());
        assert!(!pkt.is_fin());
    }

    #[test]
    fn fin_flag_bit_is_bit_seven() {
        let pkt = Packet::fin(7);
        assert_eq!(pkt.flags, 0b1000_0000);
        assert!(pkt.is_fin());
        assert!(!pkt.is_ack());
    }

    #[test]
    fn fin_ack_sets_both_bits() {
        let pkt = Packet::fin_ack(9);
        assert!(pkt.is_ack());
        assert!(pkt.is_fin());
    }

    #[test]
    fn corrupt_single_bit_is_detected() {
        let pkt = Packet::data(1, 0, Bytes::from_static(b"integrity matters"));
        let mut encoded = pkt.encode();
        // Flip one bit deep in the payload.
        let last = encoded.len() - 1;
        encoded[last] ^= 0x01;
        assert!(matches!(Packet::decode(&encoded), Err(DecodeError::Corrupt)));
    }

    #[test]
    fn corrupt_header_is_detected() {
        let pkt = Packet::data(1, 0, Bytes::from_static(b"x"));
        let mut encoded = pkt.encode();
        encoded[0] ^= 0xFF;
        assert!(matches!(Packet::decode(&encoded), Err(DecodeError::Corrupt)));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let raw = [0u8; HEADER_SIZE]; // shorter than header + digest
        assert!(matches!(Packet::decode(&raw), Err(DecodeError::Truncated)));
    }

    #[test]
    fn empty_payload_roundtrips() {
        let pkt = Packet::data(0, 0, Bytes::new());
        let encoded = pkt.encode();
        let decoded = Packet::decode(&encoded).unwrap();
        assert_eq!(decoded.payload.len(), 0);
    }

    #[test]
    fn max_payload_fits_datagram_max() {
        let payload = Bytes::from(vec![0xABu8; PAYLOAD_MAX]);
        let pkt = Packet::data(0, 0, payload);
        let encoded = pkt.encode();
        assert_eq!(encoded.len(), DATAGRAM_MAX);
    }

    proptest! {
        #[test]
        fn proptest_roundtrip(seq_n in any::<u32>(), recv_buf_size in any::<u32>(), payload in proptest::collection::vec(any::<u8>(), 0..200)) {
            let pkt = Packet::data(seq_n, recv_buf_size, Bytes::from(payload));
            let encoded = pkt.encode();
            let decoded = Packet::decode(&encoded).unwrap();
            prop_assert_eq!(decoded, pkt);
        }

        #[test]
        fn proptest_any_single_bit_flip_detected(
            payload in proptest::collection::vec(any::<u8>(), 1..64),
            bit in 0u32..8,
            byte_offset in 0usize..HEADER_SIZE,
        ) {
            let pkt = Packet::data(5, 5, Bytes::from(payload));
            let mut encoded = pkt.encode();
            encoded[byte_offset] ^= 1 << bit;
            prop_assert!(matches!(Packet::decode(&encoded), Err(DecodeError::Corrupt)));
        }
    }
}
