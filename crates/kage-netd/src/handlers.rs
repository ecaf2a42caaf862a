//! Generic lobby command dispatch.
//!
//! Every chunk that the game-specific handler declines lands here.
//! Handlers compose into the per-datagram [`Scratch`] packets; the
//! flush in `LobbyServer::handle_datagram` does the actual sending.

use kage_netproto::chunk::ChunkView;
use kage_netproto::command::Command;
use tracing::error;

use crate::lobby::{LobbyServer, Scratch};

mod chat;
mod create_room;
mod join_room;
mod leave_room;
mod login;
mod query;
mod status;

pub(crate) async fn dispatch(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    match chunk.command() {
        Some(Command::ReqLobbyLogin) => login::login(srv, pid, chunk, scratch).await,
        Some(Command::ReqLobbyLogout) => login::logout(srv, pid, chunk, scratch).await,
        Some(Command::ReqQryLobbies) => query::lobbies(srv, pid, chunk, scratch).await,
        Some(Command::ReqQryUsers) => query::users(srv, pid, chunk, scratch).await,
        Some(Command::ReqQryRooms) => query::rooms(srv, pid, chunk, scratch).await,
        Some(Command::ReqJoinLobbyRoom) => join_room::handle(srv, pid, chunk, scratch).await,
        Some(Command::ReqLeaveLobbyRoom) => leave_room::handle(srv, pid, chunk, scratch).await,
        Some(Command::ReqCreateRoom) => create_room::handle(srv, pid, chunk, scratch).await,
        Some(Command::ReqChgRoomStatus) => status::room_status(srv, pid, chunk, scratch).await,
        Some(Command::ReqChgUserStatus) => status::user_status(srv, pid, chunk, scratch).await,
        Some(Command::ReqChgUserProp) => status::user_prop(srv, pid, chunk, scratch).await,
        Some(Command::ReqChat) => chat::chat(srv, pid, chunk, scratch).await,
        Some(Command::ReqPing) => chat::ping(srv, pid, chunk, scratch).await,
        Some(Command::ReqNop) => {}
        _ => {
            error!(
                game = ?srv.game,
                command = chunk.command_raw(),
                "unhandled message type"
            );
            if chunk.is_reliable() {
                // NOP-ack so the client stops retransmitting
                scratch.reply.init(Command::ReqNop);
                scratch.reply.ack(chunk.seq());
            }
        }
    }
}
