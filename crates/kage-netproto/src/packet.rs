//! Outgoing compound-packet builder.
//!
//! A [`Packet`] accumulates one or more back-to-back chunks and becomes
//! a full UDP payload once finalized. Integer fields are big-endian.
//!
//! Chunk layout (offsets relative to the chunk start):
//! - 0..2   `flags | chunk_size` (low 10 bits size incl. header, high 6 flags)
//! - 3      command byte
//! - 4..8   player id (stamped by the reliable layer at send time)
//! - 8..12  sequence number (stamped by the reliable layer at send time)
//! - 12..16 ack sequence (valid when `FLAG_ACK` is set)
//!
//! `finalize()` stamps the current chunk header and appends the 4-byte
//! server tag; the returned length is the complete datagram size.

use crate::command::{Command, FLAG_ACK, FLAG_CONTINUE, FLAG_UNKNOWN};
use crate::error::ProtoError;
use crate::limits::{
    CHUNK_HEADER_LEN, MAX_CHUNK_LEN, PACKET_CAPACITY, SERVER_TAG, SERVER_TAG_LEN, SIZE_MASK,
};

#[derive(Clone)]
pub struct Packet {
    data: [u8; PACKET_CAPACITY],
    size: u16,
    start_offset: u16,
    flags: u16,
    cmd: u8,
    /// First oversized chunk length seen, if any. Sticky: once a chunk
    /// overflows, `finalize` refuses the whole packet.
    oversized: Option<usize>,
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl Packet {
    pub fn new() -> Self {
        Packet {
            data: [0; PACKET_CAPACITY],
            size: CHUNK_HEADER_LEN as u16,
            start_offset: 0,
            flags: FLAG_UNKNOWN,
            cmd: Command::ReqNop.as_u8(),
            oversized: None,
        }
    }

    pub fn reset(&mut self) {
        self.data.fill(0);
        self.size = CHUNK_HEADER_LEN as u16;
        self.start_offset = 0;
        self.flags = FLAG_UNKNOWN;
        self.cmd = Command::ReqNop.as_u8();
        self.oversized = None;
    }

    /// A packet is empty until it is initialized, acked or written to.
    /// Empty packets are skipped by the flush path.
    pub fn is_empty(&self) -> bool {
        self.size == CHUNK_HEADER_LEN as u16
            && self.flags == FLAG_UNKNOWN
            && self.cmd == Command::ReqNop.as_u8()
            && self.start_offset == 0
    }

    /// Start a chunk of the given command. On an empty packet this
    /// resets and claims the first chunk; otherwise the current chunk
    /// is sealed, gains `FLAG_CONTINUE`, and a new chunk is appended.
    /// Subsequent writes go to the new chunk.
    pub fn init(&mut self, cmd: Command) {
        if self.is_empty() {
            self.reset();
            self.cmd = cmd.as_u8();
        } else {
            self.seal_chunk();
            self.append(cmd);
        }
    }

    /// `RSP_OK` chunk whose first payload word echoes the request type.
    pub fn resp_ok(&mut self, cmd: Command) {
        self.init(Command::RspOk);
        self.write_u32(cmd.as_u8() as u32);
    }

    /// `RSP_FAILED` chunk whose first payload word echoes the request type.
    pub fn resp_failed(&mut self, cmd: Command) {
        self.init(Command::RspFailed);
        self.write_u32(cmd.as_u8() as u32);
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// OR additional flag bits into the current chunk.
    pub fn add_flags(&mut self, flags: u16) {
        self.flags |= flags;
    }

    /// Acknowledge a peer sequence number on the current chunk.
    pub fn ack(&mut self, seq: u32) {
        self.flags |= FLAG_ACK;
        let off = self.start_offset as usize + 0x0c;
        self.data[off..off + 4].copy_from_slice(&seq.to_be_bytes());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let off = self.size as usize;
        if off + bytes.len() > PACKET_CAPACITY - SERVER_TAG_LEN {
            self.oversized = Some(off + bytes.len());
            return;
        }
        self.data[off..off + bytes.len()].copy_from_slice(bytes);
        self.size += bytes.len() as u16;
    }

    /// Write a string into a fixed-width field, zero-padding the tail.
    /// Exactly `width` bytes are consumed.
    pub fn write_str(&mut self, s: &str, width: usize) {
        let off = self.size as usize;
        if off + width > PACKET_CAPACITY - SERVER_TAG_LEN {
            self.oversized = Some(off + width);
            return;
        }
        let n = s.len().min(width);
        self.data[off..off + n].copy_from_slice(&s.as_bytes()[..n]);
        self.data[off + n..off + width].fill(0);
        self.size += width as u16;
    }

    /// Rewrite a 16-bit word at an absolute datagram offset. Used to
    /// re-stamp per-recipient fields in an already composed packet.
    pub fn patch_u16(&mut self, offset: usize, v: u16) {
        self.data[offset..offset + 2].copy_from_slice(&v.to_be_bytes());
    }

    /// Rewrite a 32-bit word at an absolute datagram offset. Used by
    /// the reliable layer to stamp player ids and sequence numbers.
    pub fn patch_u32(&mut self, offset: usize, v: u32) {
        self.data[offset..offset + 4].copy_from_slice(&v.to_be_bytes());
    }

    pub fn u16_at(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Seal the current chunk and append the server tag. Returns the
    /// total datagram length. Errors when any chunk overflowed; the
    /// caller drops the reply (encode overflow is a programming fault,
    /// never a client-triggered condition).
    pub fn finalize(&mut self) -> Result<usize, ProtoError> {
        self.seal_chunk();
        if let Some(n) = self.oversized {
            return if n > PACKET_CAPACITY - SERVER_TAG_LEN {
                Err(ProtoError::CapacityExceeded)
            } else {
                Err(ProtoError::ChunkTooLarge(n))
            };
        }
        let off = self.size as usize;
        self.data[off..off + SERVER_TAG_LEN].copy_from_slice(&SERVER_TAG.to_be_bytes());
        Ok(off + SERVER_TAG_LEN)
    }

    /// The finalized datagram, server tag included. Only meaningful
    /// after a successful [`finalize`](Self::finalize).
    pub fn datagram(&self) -> &[u8] {
        &self.data[..self.size as usize + SERVER_TAG_LEN]
    }

    /// Offsets of every chunk in a sealed packet, in datagram order.
    /// Valid after [`finalize`](Self::finalize).
    pub fn chunk_offsets(&self) -> ChunkOffsets<'_> {
        ChunkOffsets {
            packet: self,
            offset: 0,
        }
    }

    pub fn chunk_flags_at(&self, offset: usize) -> u16 {
        self.u16_at(offset) & crate::limits::FLAGS_MASK
    }

    pub fn chunk_command_at(&self, offset: usize) -> u8 {
        self.data[offset + 3]
    }

    fn seal_chunk(&mut self) {
        let chunk_size = self.size - self.start_offset;
        if chunk_size as usize > MAX_CHUNK_LEN && self.oversized.is_none() {
            self.oversized = Some(chunk_size as usize);
        }
        let off = self.start_offset as usize;
        let word = self.flags | (chunk_size & SIZE_MASK);
        self.data[off..off + 2].copy_from_slice(&word.to_be_bytes());
        self.data[off + 3] = self.cmd;
    }

    fn append(&mut self, cmd: Command) {
        // The previous chunk is sealed at this point; mark it continued.
        let off = self.start_offset as usize;
        let word = self.u16_at(off) | FLAG_CONTINUE;
        self.data[off..off + 2].copy_from_slice(&word.to_be_bytes());

        self.start_offset = self.size;
        let off = self.start_offset as usize;
        if off + CHUNK_HEADER_LEN > PACKET_CAPACITY - SERVER_TAG_LEN {
            self.oversized = Some(off + CHUNK_HEADER_LEN);
            return;
        }
        // Clear the header area; a tag from an earlier finalize may
        // still be sitting there.
        self.data[off..off + CHUNK_HEADER_LEN].fill(0);
        self.size += CHUNK_HEADER_LEN as u16;
        self.cmd = cmd.as_u8();
        self.flags = FLAG_UNKNOWN;
    }
}

pub struct ChunkOffsets<'a> {
    packet: &'a Packet,
    offset: usize,
}

impl Iterator for ChunkOffsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.offset >= self.packet.size as usize {
            return None;
        }
        let off = self.offset;
        let size = (self.packet.u16_at(off) & SIZE_MASK) as usize;
        if size < CHUNK_HEADER_LEN {
            // sealed packets never contain an undersized chunk
            return None;
        }
        self.offset += size;
        Some(off)
    }
}
