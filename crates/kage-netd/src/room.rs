//! Lobby and room state.
//!
//! Rooms and players are kept in id-keyed arenas on the owning lobby
//! server; lobbies, rooms and players reference each other by id only,
//! so a player timing out mid-iteration can never dangle.

use crate::games::bomberman::BmState;
use crate::games::outtrigger::OtState;
use crate::netdump::NetDump;

pub(crate) const LOBBY_ID_BASE: u32 = 0x3001;
pub(crate) const FIRST_ROOM_ID: u32 = 0x2001;
pub(crate) const MAX_LOBBIES: usize = 10;

/// Room attribute bits.
pub(crate) mod attrs {
    /// Set by the server when it creates the room.
    pub const SERVER_READY: u32 = 0x0000_0001;
    pub const PASSWORD: u32 = 0x0100_0000;
    pub const TEAM: u32 = 0x0200_0000;
    pub const LOCKED: u32 = 0x4000_0000;
    pub const PLAYING: u32 = 0x8000_0000;
}

pub(crate) struct Lobby {
    pub id: u32,
    pub name: String,
    pub players: Vec<u32>,
    pub rooms: Vec<u32>,
}

impl Lobby {
    pub fn new(id: u32, name: &str) -> Lobby {
        debug_assert!(name.len() <= 16);
        Lobby {
            id,
            name: name.to_string(),
            players: Vec::new(),
            rooms: Vec::new(),
        }
    }
}

/// Game-specific room payload. Bomberman rooms track guest slots and
/// rules; Outtrigger rooms (also serving Propeller Arena) run the
/// match state machine.
pub(crate) enum RoomKind {
    Bomberman(BmState),
    Outtrigger(OtState),
}

pub(crate) struct Room {
    pub id: u32,
    pub lobby_id: u32,
    pub name: String,
    pub attributes: u32,
    pub owner: u32,
    pub max_players: u32,
    pub password: String,
    /// Member ids in join order; `players[0]` inherits ownership.
    pub players: Vec<u32>,
    pub kind: RoomKind,
    pub netdump: Option<NetDump>,
}

impl Room {
    pub fn new(id: u32, lobby_id: u32, name: String, attributes: u32, kind: RoomKind) -> Room {
        Room {
            id,
            lobby_id,
            name,
            attributes,
            owner: 0,
            max_players: 0,
            password: String::new(),
            players: Vec::new(),
            kind,
            netdump: None,
        }
    }

    pub fn player_index(&self, player_id: u32) -> Option<usize> {
        self.players.iter().position(|&p| p == player_id)
    }

    /// Advertised player count. For Bomberman this is the slot sum
    /// (guest pads share their host's connection), not the member
    /// count.
    pub fn player_count(&self) -> u32 {
        match &self.kind {
            RoomKind::Bomberman(bm) => bm.slot_sum(),
            RoomKind::Outtrigger(_) => self.players.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_bits_are_locked() {
        assert_eq!(attrs::SERVER_READY, 1);
        assert_eq!(attrs::PASSWORD, 0x0100_0000);
        assert_eq!(attrs::TEAM, 0x0200_0000);
        assert_eq!(attrs::LOCKED, 0x4000_0000);
        assert_eq!(attrs::PLAYING, 0x8000_0000);
    }

    #[test]
    fn bomberman_player_count_is_slot_sum() {
        let mut room = Room::new(
            FIRST_ROOM_ID,
            LOBBY_ID_BASE,
            "test".into(),
            attrs::SERVER_READY,
            RoomKind::Bomberman(BmState::default()),
        );
        room.players = vec![1, 2];
        if let RoomKind::Bomberman(bm) = &mut room.kind {
            bm.slots = vec![3, 1];
        }
        assert_eq!(room.player_count(), 4);

        room.kind = RoomKind::Outtrigger(OtState::default());
        assert_eq!(room.player_count(), 2);
    }
}
