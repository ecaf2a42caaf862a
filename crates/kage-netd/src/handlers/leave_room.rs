use kage_netproto::chunk::ChunkView;
use kage_netproto::command::{Command, FLAG_LOBBY};

use crate::lobby::{LobbyServer, Scratch};

/// `REQ_LEAVE_LOBBY_ROOM`: bit 0x10 of byte 0 selects the lobby,
/// otherwise the current room. The room relays the departure itself.
pub(crate) async fn handle(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    if chunk.u8_at(0) & 0x10 != 0 {
        scratch.reply.resp_ok(Command::ReqLeaveLobbyRoom);
        scratch.reply.add_flags(FLAG_LOBBY);
        if let Some(lobby_id) = srv.players.get(&pid).and_then(|p| p.lobby) {
            srv.lobby_remove_player(lobby_id, pid).await;
        }
    } else {
        scratch.reply.resp_ok(Command::ReqLeaveLobbyRoom);
        if let Some(room_id) = srv.players.get(&pid).and_then(|p| p.room) {
            srv.room_remove_player(room_id, pid).await;
        }
    }
    scratch.reply.ack(chunk.seq());
}
