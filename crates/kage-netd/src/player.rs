//! Per-player state, including the reliable-send bookkeeping.
//!
//! The reliable pipeline keeps at most one packet in flight per player.
//! Sequence numbers for the reliable and unreliable streams are
//! independent and both start at 0; the highest acknowledged reliable
//! sequence starts at -1 so sequence 0 is "next in order".

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;

/// Idle timeout while not in a room.
pub(crate) const LOBBY_TIMEOUT: Duration = Duration::from_secs(2 * 60);
/// Idle timeout while in a room.
pub(crate) const ROOM_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) struct Player {
    pub id: u32,
    pub name: String,
    pub addr: SocketAddr,
    /// Opaque blob echoed to peers; Bomberman stores the guest-slot
    /// count in the first dword, Outtrigger character/rank data.
    pub extra_data: Vec<u8>,
    /// Client-reported status word; stored but never interpreted.
    #[allow(dead_code)]
    pub status: u32,
    pub lobby: Option<u32>,
    pub room: Option<u32>,
    pub last_seen: Instant,

    // Reliable stream
    pub rel_seq: u32,
    pub unrel_seq: u32,
    pub acked_rel_seq: i64,
    pub in_flight: Option<Bytes>,
    pub rel_queue: VecDeque<(u32, Bytes)>,
    pub send_count: u32,
    pub retx_epoch: u64,
    /// When the reliable packet with this sequence is acked, the
    /// player's room is notified (`rudp_acked`).
    pub waiting_for_seq: Option<u32>,
}

impl Player {
    pub fn new(id: u32, addr: SocketAddr) -> Player {
        Player {
            id,
            name: String::new(),
            addr,
            extra_data: Vec::new(),
            status: 0,
            lobby: None,
            room: None,
            last_seen: Instant::now(),
            rel_seq: 0,
            unrel_seq: 0,
            acked_rel_seq: -1,
            in_flight: None,
            rel_queue: VecDeque::new(),
            send_count: 0,
            retx_epoch: 0,
            waiting_for_seq: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn timed_out(&self, now: Instant) -> bool {
        let limit = if self.room.is_none() {
            LOBBY_TIMEOUT
        } else {
            ROOM_TIMEOUT
        };
        now.duration_since(self.last_seen) >= limit
    }

    /// Arm the room notification for the next reliable send: its
    /// sequence will be the current `rel_seq`.
    pub fn notify_room_on_ack(&mut self) {
        self.waiting_for_seq = Some(self.rel_seq);
    }

    /// Cancel any pending retransmit timer by invalidating its epoch.
    pub fn cancel_retransmit(&mut self) {
        self.retx_epoch = self.retx_epoch.wrapping_add(1);
    }
}
