//! Packet codec (C1): encode/decode the fixed-header data and ACK packets.
//!
//! Both packet kinds share one 20-byte header shape. The first four bytes
//! are always a big-endian `u32` (a sequence number on a data packet, a
//! cumulative ACK value on an ACK packet); the remaining sixteen are zero
//! padding on data packets and up to two SACK blocks on ACK packets.

use crate::binary::{BinaryReader, BinaryWriter, BinaryError};
use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Header size in bytes, shared by data and ACK packets.
pub const HEADER_LEN: usize = 20;
/// Maximum UDP payload size this protocol ever sends, header included.
pub const MSS: usize = 1200;
/// Maximum bytes of file data carried by one data packet.
pub const DATA_PAYLOAD: usize = MSS - HEADER_LEN;
/// Literal payload marking the end of the stream.
pub const EOF_MARKER: &[u8] = b"EOF";

/// A `[start, end)` byte range the receiver holds out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SackBlock {
    pub start: u32,
    pub end: u32,
}

impl SackBlock {
    /// True if `[seq, seq+len)` lies entirely within this block.
    pub fn covers(&self, seq: u32, len: u32) -> bool {
        seq >= self.start && seq.saturating_add(len) <= self.end
    }
}

/// A decoded data packet.
#[derive(Debug, Clone)]
pub struct DataPacket {
    pub seq: u32,
    pub payload: Bytes,
    pub eof: bool,
}

/// A decoded ACK packet: a cumulative value plus up to two SACK blocks.
#[derive(Debug, Clone, Default)]
pub struct AckPacket {
    pub cumulative: u32,
    pub sack_blocks: Vec<SackBlock>,
}

/// Errors raised while decoding a datagram off the wire.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("packet shorter than the {HEADER_LEN}-byte header: {0}")]
    TooShort(#[from] BinaryError),
}

/// Encodes a data packet. When `eof` is set, the wire payload is always the
/// literal `EOF` marker regardless of `payload`'s contents.
pub fn encode_data(seq: u32, payload: &[u8], eof: bool) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len().max(EOF_MARKER.len()));
    buf.write_u32_be(seq);
    buf.extend_from_slice(&[0u8; HEADER_LEN - 4]);
    if eof {
        buf.extend_from_slice(EOF_MARKER);
    } else {
        buf.extend_from_slice(payload);
    }
    buf
}

/// Decodes a data packet. A payload that is exactly the `EOF` literal is
/// reported as `eof = true` with an empty payload, matching the receiver's
/// treatment of the terminator as carrying no stream bytes.
pub fn decode_data(mut buf: Bytes) -> Result<DataPacket, CodecError> {
    let seq = buf.read_u32_be()?;
    let _reserved = buf.read_bytes(HEADER_LEN - 4)?;
    let payload = buf;
    if payload.as_ref() == EOF_MARKER {
        Ok(DataPacket {
            seq,
            payload: Bytes::new(),
            eof: true,
        })
    } else {
        Ok(DataPacket {
            seq,
            payload,
            eof: false,
        })
    }
}

/// Encodes an ACK packet: `cumulative` followed by up to two SACK blocks,
/// zero-padded when fewer than two are supplied. Only the first two blocks
/// are ever written; callers are expected to have already coalesced and
/// truncated to two.
pub fn encode_ack(cumulative: u32, sack_blocks: &[SackBlock]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    buf.write_u32_be(cumulative);
    for i in 0..2 {
        match sack_blocks.get(i) {
            Some(block) => {
                buf.write_u32_be(block.start);
                buf.write_u32_be(block.end);
            }
            None => {
                buf.write_u32_be(0);
                buf.write_u32_be(0);
            }
        }
    }
    buf
}

/// Decodes an ACK packet. A block is "absent" when `end <= start` (this
/// covers the `(0, 0)` zero-padding case) and is simply omitted.
pub fn decode_ack(mut buf: Bytes) -> Result<AckPacket, CodecError> {
    let cumulative = buf.read_u32_be()?;
    let mut sack_blocks = Vec::with_capacity(2);
    for _ in 0..2 {
        let start = buf.read_u32_be()?;
        let end = buf.read_u32_be()?;
        if end > start {
            sack_blocks.push(SackBlock { start, end });
        }
    }
    Ok(AckPacket {
        cumulative,
        sack_blocks,
    })
}
