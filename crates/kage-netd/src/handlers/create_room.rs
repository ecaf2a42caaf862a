use kage_netproto::chunk::ChunkView;
use kage_netproto::command::{Command, FLAG_LOBBY};

use crate::games;
use crate::lobby::{LobbyServer, Scratch};
use crate::room::attrs;

/// `REQ_CREATE_ROOM`: name at 0x10 (16 bytes), max players at 0x20,
/// password at 0x24 (20 bytes), attributes at 0x38. The creator
/// becomes owner and sole member; the lobby is notified.
pub(crate) async fn handle(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let name = chunk.cstr_fixed(0x10, 0x10);
    let max_players = chunk.u32_at(0x20);
    let password = chunk.cstr_fixed(0x24, 0x14);
    let attributes = chunk.u32_at(0x38) | attrs::SERVER_READY;

    if srv.players.get(&pid).and_then(|p| p.lobby).is_none() {
        scratch.reply.resp_failed(Command::ReqCreateRoom);
        scratch.reply.ack(chunk.seq());
        return;
    }
    let Some(room_id) = srv
        .create_room(name.clone(), attributes, pid, max_players, password)
        .await
    else {
        scratch.reply.resp_failed(Command::ReqCreateRoom);
        scratch.reply.ack(chunk.seq());
        return;
    };

    let relay = &mut scratch.relay;
    relay.init(Command::ReqCreateRoom);
    relay.add_flags(FLAG_LOBBY);
    relay.write_str(&name, 0x10);
    relay.write_u32(1); // player count
    relay.write_u32(pid);
    relay.write_u32(attributes);
    relay.write_u32(max_players);
    relay.write_u32(room_id);

    scratch.reply.resp_ok(Command::ReqCreateRoom);
    scratch.reply.write_u32(room_id);
    scratch.reply.ack(chunk.seq());

    scratch.reply.init(Command::ReqChgRoomStatus);
    scratch.reply.write_u32(room_id);
    scratch.reply.write_str("STAT", 4);
    scratch.reply.write_u32(attributes);

    games::join_room_reply(srv, room_id, pid, scratch);
}
