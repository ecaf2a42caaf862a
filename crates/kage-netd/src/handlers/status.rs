use kage_netproto::chunk::ChunkView;
use kage_netproto::command::Command;
use tracing::debug;

use crate::lobby::{LobbyServer, Scratch};

/// `REQ_CHG_ROOM_STATUS`: attributes at 0x14 replace the room's; both
/// the sender and the other members see the `{id, "STAT", attrs}` echo.
pub(crate) async fn room_status(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    match srv.players.get(&pid).and_then(|p| p.room) {
        None => scratch.reply.resp_failed(Command::ReqChgRoomStatus),
        Some(room_id) => {
            let attributes = chunk.u32_at(0x14);
            srv.set_room_attributes(room_id, attributes).await;

            let relay = &mut scratch.relay;
            relay.init(Command::ReqChgRoomStatus);
            relay.write_u32(room_id);
            relay.write_str("STAT", 4);
            relay.write_u32(attributes);

            scratch.reply.resp_ok(Command::ReqChgRoomStatus);
            scratch.reply.write_u32(room_id);
            scratch.reply.write_str("STAT", 4);
            scratch.reply.write_u32(attributes);
        }
    }
    scratch.reply.ack(chunk.seq());
}

/// `REQ_CHG_USER_STATUS`: store the status word at 0x10.
pub(crate) async fn user_status(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let status = chunk.u32_at(0x10);
    debug!(game = ?srv.game, status, "REQ_CHG_USER_STATUS");
    if let Some(player) = srv.players.get_mut(&pid) {
        player.status = status;
    }
    scratch.reply.resp_ok(Command::ReqChgUserStatus);
    scratch.reply.ack(chunk.seq());
    scratch.reply.write_u32(0);
}

/// `REQ_CHG_USER_PROP`: the payload from 0x10 replaces the player's
/// extra data.
pub(crate) async fn user_prop(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    debug!(game = ?srv.game, "REQ_CHG_USER_PROP");
    if let Some(player) = srv.players.get_mut(&pid) {
        player.extra_data = chunk.tail(0x10).to_vec();
    }
    scratch.reply.resp_ok(Command::ReqChgUserProp);
    scratch.reply.ack(chunk.seq());
}
