use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::Game;

/// Which UDP endpoint a datagram arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Bootstrap,
    Lobby(Game),
}

/// Everything the server loop reacts to. Datagrams come from the UDP
/// reader tasks; the rest are timer firings. Each timer event carries
/// the epoch current when it was armed — the loop drops events whose
/// epoch no longer matches, which is how timers are "cancelled"
/// without any shared state.
#[derive(Debug)]
pub enum Event {
    Datagram {
        service: Service,
        peer: SocketAddr,
        data: Bytes,
    },
    /// Reliable-send retransmit timer for one player.
    Retransmit {
        game: Game,
        player_id: u32,
        epoch: u64,
    },
    /// Forcible disconnect requested by the reliable layer (queue
    /// overflow). Deferred through the loop so removal never reenters
    /// a send path.
    Disconnect { game: Game, player_id: u32 },
    /// Periodic game-data broadcast tick for one room.
    RoomTick {
        game: Game,
        room_id: u32,
        epoch: u64,
    },
    /// One-shot match time limit for one room.
    TimeLimit {
        game: Game,
        room_id: u32,
        epoch: u64,
    },
    /// Player liveness sweep.
    Sweep,
}

pub type EventTx = mpsc::Sender<Event>;
