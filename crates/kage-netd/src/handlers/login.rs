use kage_netproto::chunk::ChunkView;
use kage_netproto::command::Command;
use tracing::debug;

use crate::lobby::{LobbyServer, Scratch};

/// `REQ_LOBBY_LOGIN`: the client re-introduces itself on the game port
/// after the bootstrap handoff. Name at 0x20, extra data at 0x138 with
/// its length at 0x14.
pub(crate) async fn login(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    debug!(game = ?srv.game, "REQ_LOBBY_LOGIN");
    let name = chunk.cstr_at(0x20);
    let extra_len = chunk.u32_at(0x14) as usize;
    let extra = chunk.slice_at(0x138, extra_len).to_vec();
    if let Some(player) = srv.players.get_mut(&pid) {
        player.name = name;
        player.extra_data = extra;
    }
    scratch.reply.init(Command::RspLoginSuccess2);
    scratch.reply.write_u32(srv.port as u32);
    scratch.reply.write_u32(0);
    scratch.reply.write_u32(pid);
}

/// `REQ_LOBBY_LOGOUT`: ack first, then tear the player down. Any
/// further chunks in the datagram are dropped.
pub(crate) async fn logout(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    scratch.reply.resp_ok(Command::ReqLobbyLogout);
    scratch.reply.ack(chunk.seq());
    srv.send_to_player(pid, &mut scratch.reply).await;
    scratch.reply.reset();
    srv.remove_player(pid).await;
    scratch.finished = true;
}
