//! Named size limits for the kage wire format.
//!
//! Single source of truth for every framing constant, so the packet
//! builder, the datagram parser and the server agree on the exact same
//! numbers.

/// Trailer appended to every outgoing datagram, big-endian on the wire.
/// Receivers strip the last four bytes of a datagram before chunking.
pub const SERVER_TAG: u32 = 0x006647BA;

/// Size of the server tag in bytes.
pub const SERVER_TAG_LEN: usize = 4;

/// Fixed per-chunk header length in bytes.
pub const CHUNK_HEADER_LEN: usize = 0x10;

/// Maximum encoded chunk length (header included). The chunk length
/// field is 10 bits wide; anything larger cannot be represented.
pub const MAX_CHUNK_LEN: usize = 0x3ff;

/// Smallest valid datagram: one chunk header plus the server tag.
pub const MIN_DATAGRAM_LEN: usize = 0x14;

/// Receive buffer size. Datagrams never exceed this.
pub const RECV_BUFFER_LEN: usize = 1510;

/// Capacity of an outgoing packet buffer.
pub const PACKET_CAPACITY: usize = 0x800;

/// Mask selecting the chunk size out of the first header word.
pub const SIZE_MASK: u16 = 0x03ff;

/// Mask selecting the flag bits out of the first header word.
pub const FLAGS_MASK: u16 = 0xfc00;
