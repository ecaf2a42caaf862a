use kage_netproto::chunk::ChunkView;
use kage_netproto::command::{Command, FLAG_LOBBY};
use tracing::{info, warn};

use crate::games;
use crate::lobby::{LobbyServer, Scratch};
use crate::room::attrs;

/// Join failure codes understood by the clients.
const ERR_NOT_FOUND: u32 = 8;
const ERR_LOCKED: u32 = 9;
const ERR_BAD_PASSWORD: u32 = 0xf;

/// `REQ_JOIN_LOBBY_ROOM`: bit 0x10 of byte 0 selects lobby join,
/// otherwise the id names a room in the player's lobby.
pub(crate) async fn handle(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let id = chunk.u32_at(0x10);
    if chunk.u8_at(0) & 0x10 != 0 {
        join_lobby(srv, pid, id, chunk, scratch).await;
    } else {
        join_room(srv, pid, id, chunk, scratch).await;
    }
}

async fn join_lobby(
    srv: &mut LobbyServer,
    pid: u32,
    id: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    if srv.lobby(id).is_none() {
        scratch.reply.resp_failed(Command::ReqJoinLobbyRoom);
        scratch.reply.write_u32(ERR_NOT_FOUND);
        let name = srv.players.get(&pid).map(|p| p.name.clone()).unwrap_or_default();
        warn!(game = ?srv.game, player = %name, lobby = id, "join lobby failed: unknown lobby id");
    } else {
        srv.lobby_add_player(id, pid).await;

        let (name, extra) = match srv.players.get(&pid) {
            Some(p) => (p.name.clone(), p.extra_data.clone()),
            None => return,
        };
        let relay = &mut scratch.relay;
        relay.init(Command::ReqJoinLobbyRoom);
        relay.add_flags(FLAG_LOBBY);
        relay.write_str(&name, 0x10);
        relay.write_u32(pid);
        relay.write_u32(extra.len() as u32);
        relay.write_bytes(&extra);

        scratch.reply.resp_ok(Command::ReqJoinLobbyRoom);
        scratch.reply.write_u32(id);
    }
    scratch.reply.add_flags(FLAG_LOBBY);
    scratch.reply.ack(chunk.seq());
}

async fn join_room(
    srv: &mut LobbyServer,
    pid: u32,
    id: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let name = srv.players.get(&pid).map(|p| p.name.clone()).unwrap_or_default();
    let lobby_id = srv.players.get(&pid).and_then(|p| p.lobby);
    let room = srv
        .rooms
        .get(&id)
        .filter(|room| Some(room.lobby_id) == lobby_id);
    let Some(room) = room else {
        scratch.reply.resp_failed(Command::ReqJoinLobbyRoom);
        scratch.reply.ack(chunk.seq());
        scratch.reply.write_u32(ERR_NOT_FOUND);
        warn!(game = ?srv.game, player = %name, room = id, "join room failed: unknown room id");
        return;
    };
    if room.attributes & (attrs::LOCKED | attrs::PLAYING) != 0 {
        scratch.reply.resp_failed(Command::ReqJoinLobbyRoom);
        scratch.reply.ack(chunk.seq());
        scratch.reply.write_u32(ERR_LOCKED);
        info!(game = ?srv.game, player = %name, "join room failed: room locked");
        return;
    }
    let password = chunk.cstr_at(0x18);
    if password != room.password {
        scratch.reply.resp_failed(Command::ReqJoinLobbyRoom);
        scratch.reply.ack(chunk.seq());
        scratch.reply.write_u32(ERR_BAD_PASSWORD);
        info!(game = ?srv.game, player = %name, "join room failed: incorrect password");
        return;
    }
    if room.player_count() >= room.max_players {
        scratch.reply.resp_failed(Command::ReqJoinLobbyRoom);
        scratch.reply.ack(chunk.seq());
        scratch.reply.write_u32(ERR_NOT_FOUND);
        warn!(game = ?srv.game, player = %name, room = %room.name, "join room failed: room full");
        return;
    }
    srv.room_add_player(id, pid).await;

    let (name, extra) = match srv.players.get(&pid) {
        Some(p) => (p.name.clone(), p.extra_data.clone()),
        None => return,
    };
    let relay = &mut scratch.relay;
    relay.init(Command::ReqJoinLobbyRoom);
    relay.write_str(&name, 0x10);
    relay.write_u32(pid);
    relay.write_u32(extra.len() as u32);
    relay.write_bytes(&extra);

    scratch.reply.resp_ok(Command::ReqJoinLobbyRoom);
    scratch.reply.write_u32(id);
    scratch.reply.ack(chunk.seq());

    // Push the room status to the new member.
    let attributes = srv.rooms.get(&id).map(|r| r.attributes).unwrap_or(0);
    scratch.reply.init(Command::ReqChgRoomStatus);
    scratch.reply.write_u32(id);
    scratch.reply.write_str("STAT", 4);
    scratch.reply.write_u32(attributes);

    games::join_room_reply(srv, id, pid, scratch);
}
