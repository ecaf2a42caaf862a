//! Game-specific behavior, dispatched on the room kind or the server's
//! game. Bomberman and the Outtrigger engine (which also serves
//! Propeller Arena) each get first refusal on incoming chunks before
//! the generic lobby handler runs.

use std::fmt::Write as _;

use kage_netproto::chunk::ChunkView;

use crate::lobby::{LobbyServer, Scratch};
use crate::room::RoomKind;
use crate::Game;

pub mod bomberman;
pub mod outtrigger;

/// Game-specific chunk handling. Returns true when the chunk was
/// consumed.
pub(crate) async fn handle_chunk(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) -> bool {
    match srv.game {
        Game::Bomberman => bomberman::handle_chunk(srv, pid, chunk, scratch).await,
        Game::Outtrigger | Game::PropellerA => {
            outtrigger::handle_chunk(srv, pid, chunk, scratch).await
        }
    }
}

/// Compose the game-specific part of a create/join reply for the
/// joining player (and the matching relay for existing members).
pub(crate) fn join_room_reply(srv: &LobbyServer, room_id: u32, pid: u32, scratch: &mut Scratch) {
    let Some(room) = srv.rooms.get(&room_id) else {
        return;
    };
    match &room.kind {
        RoomKind::Bomberman(_) => bomberman::join_room_reply(srv, room_id, pid, scratch),
        RoomKind::Outtrigger(_) => {}
    }
}

/// Membership hook, invoked before the player is dropped from the
/// member list.
pub(crate) async fn on_remove_player(srv: &mut LobbyServer, room_id: u32, pid: u32, idx: usize) {
    let Some(room) = srv.rooms.get(&room_id) else {
        return;
    };
    match &room.kind {
        RoomKind::Bomberman(_) => {}
        RoomKind::Outtrigger(_) => outtrigger::on_remove_player(srv, room_id, pid, idx).await,
    }
}

/// A reliable packet this player's room was waiting on got acked.
pub(crate) async fn rudp_acked(srv: &mut LobbyServer, room_id: u32, pid: u32) {
    let Some(room) = srv.rooms.get(&room_id) else {
        return;
    };
    match &room.kind {
        RoomKind::Bomberman(_) => {}
        RoomKind::Outtrigger(_) => outtrigger::rudp_acked(srv, room_id, pid).await,
    }
}

/// Room attribute transition hook, invoked before the new attributes
/// are stored.
pub(crate) async fn on_attributes_changed(
    srv: &mut LobbyServer,
    room_id: u32,
    old: u32,
    new: u32,
) {
    let Some(room) = srv.rooms.get(&room_id) else {
        return;
    };
    match &room.kind {
        RoomKind::Bomberman(_) => {}
        RoomKind::Outtrigger(_) => {
            outtrigger::on_attributes_changed(srv, room_id, old, new).await
        }
    }
}

/// Hex dump with an ASCII column, for unknown sub-command payloads.
pub(crate) fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for line in data.chunks(16) {
        let mut ascii = String::with_capacity(16);
        for &b in line {
            let _ = write!(out, "{b:02x} ");
            ascii.push(if (b' '..0x7f).contains(&b) { b as char } else { '.' });
        }
        for _ in line.len()..16 {
            out.push_str("   ");
        }
        out.push_str(&ascii);
        out.push('\n');
    }
    out
}
