use kage_netproto::chunk::ChunkView;
use kage_netproto::command::{Command, FLAG_LOBBY};
use kage_netproto::packet::Packet;

use crate::lobby::{LobbyServer, Scratch};
use crate::Game;

/// `REQ_QRY_LOBBIES`: `{0, 0, count, [name16, players, rooms, id]*}`.
pub(crate) async fn lobbies(
    srv: &mut LobbyServer,
    _pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let r = &mut scratch.reply;
    r.init(Command::ReqQryLobbies);
    r.ack(chunk.seq());
    r.write_u32(0);
    r.write_u32(0);
    r.write_u32(srv.lobbies.len() as u32);
    for lobby in &srv.lobbies {
        r.write_str(&lobby.name, 0x10);
        r.write_u32(lobby.players.len() as u32);
        r.write_u32(lobby.rooms.len() as u32);
        r.write_u32(lobby.id);
    }
}

fn write_user_row(r: &mut Packet, name: &str, id: u32, extra: &[u8]) {
    r.write_str(name, 0x10);
    r.write_u32(id);
    r.write_u32(extra.len() as u32);
    r.write_bytes(extra);
}

/// `REQ_QRY_USERS`: enumerate a lobby (bit 0x10 of byte 0) or a room.
/// Each row carries that player's own extra data.
pub(crate) async fn users(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let r = &mut scratch.reply;
    r.init(Command::ReqQryUsers);
    r.ack(chunk.seq());
    if chunk.u8_at(0) & 0x10 != 0 {
        r.add_flags(FLAG_LOBBY);
        r.write_u32(0);
        r.write_u32(0);
        match srv.lobby(chunk.u32_at(0x10)) {
            None => r.write_u32(0),
            Some(lobby) => {
                r.write_u32(lobby.players.len() as u32);
                for member in &lobby.players {
                    let Some(p) = srv.players.get(member) else {
                        continue;
                    };
                    write_user_row(r, &p.name, p.id, &p.extra_data);
                }
            }
        }
    } else {
        r.write_u32(0);
        r.write_u32(0);
        let room_id = chunk.u32_at(0x10);
        let lobby_id = srv.players.get(&pid).and_then(|p| p.lobby);
        let room = srv
            .rooms
            .get(&room_id)
            .filter(|room| Some(room.lobby_id) == lobby_id);
        match room {
            None => r.write_u32(0),
            Some(room) => {
                r.write_u32(room.players.len() as u32);
                for member in &room.players {
                    let Some(p) = srv.players.get(member) else {
                        continue;
                    };
                    write_user_row(r, &p.name, p.id, &p.extra_data);
                }
            }
        }
    }
}

/// `REQ_QRY_ROOMS`: rooms of a lobby. The owner/player-count pair is
/// ordered differently for Bomberman.
pub(crate) async fn rooms(
    srv: &mut LobbyServer,
    _pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let r = &mut scratch.reply;
    r.init(Command::ReqQryRooms);
    r.ack(chunk.seq());
    r.add_flags(FLAG_LOBBY);
    r.write_u32(0);
    r.write_u32(0);
    match srv.lobby(chunk.u32_at(0x10)) {
        None => r.write_u32(0),
        Some(lobby) => {
            r.write_u32(lobby.rooms.len() as u32);
            for room_id in &lobby.rooms {
                let Some(room) = srv.rooms.get(room_id) else {
                    continue;
                };
                r.write_str(&room.name, 0x10);
                if srv.game == Game::Bomberman {
                    r.write_u32(room.owner);
                    r.write_u32(room.player_count());
                } else {
                    r.write_u32(room.player_count());
                    r.write_u32(room.owner);
                }
                r.write_u32(room.attributes);
                r.write_u32(room.max_players);
                r.write_u32(room.id);
            }
        }
    }
}
