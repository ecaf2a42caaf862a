use kage_netproto::chunk::ChunkView;
use kage_netproto::command::{Command, FLAG_LOBBY, FLAG_RELAY, FLAG_RUDP};
use tracing::{debug, info};

use crate::lobby::{LobbyServer, Scratch};

/// `REQ_CHAT`: reliable relayed chat is forwarded to the lobby or room
/// peers (per `FLAG_LOBBY`); anything else is ignored. A chat chunk
/// whose sequence is 0 is not acked.
pub(crate) async fn chat(
    srv: &mut LobbyServer,
    _pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let flags = chunk.flags();
    if flags & FLAG_RUDP == 0 {
        info!(game = ?srv.game, "unreliable chat ignored");
        return;
    }
    if flags & FLAG_RELAY == 0 {
        info!(game = ?srv.game, "non-relayed chat ignored");
        return;
    }
    let relay = &mut scratch.relay;
    relay.init(Command::ReqChat);
    relay.add_flags(FLAG_RUDP | (flags & (FLAG_LOBBY | FLAG_RELAY)));
    relay.write_bytes(chunk.tail(0x10));

    let seq = chunk.seq();
    if seq == 0 {
        // don't ack continued chat chunks
        return;
    }
    scratch.reply.resp_ok(Command::ReqChat);
    scratch.reply.ack(seq);
    scratch.reply.add_flags(flags & FLAG_LOBBY);
}

/// `REQ_PING`: echo the payload back under `RSP_OK`. Outtrigger and
/// Propeller Arena send a single clock value; Bomberman sends more but
/// only reads the first word of the response.
pub(crate) async fn ping(
    srv: &mut LobbyServer,
    _pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    debug!(game = ?srv.game, "REQ_PING");
    scratch.reply.resp_ok(Command::ReqPing);
    scratch.reply.write_bytes(chunk.tail(0x10));
}
