//! Bootstrap endpoint (port 9090).
//!
//! Clients contact this port first. The login carries a game
//! identifier string; the server allocates a user id, creates the
//! player on the matching game server, and answers with that server's
//! port. The client then reconnects to the game port from the same
//! source endpoint.

use std::net::SocketAddr;

use kage_netproto::chunk::{split_datagram, ChunkView};
use kage_netproto::command::Command;
use kage_netproto::packet::Packet;
use tracing::{error, info, warn};

use crate::player::Player;
use crate::{Game, ServerState};

impl ServerState {
    pub(crate) async fn handle_bootstrap(&mut self, peer: SocketAddr, data: &[u8]) {
        let chunks = match split_datagram(data) {
            Ok(chunks) => chunks,
            Err(e) => {
                error!(%peer, error = %e, "dropping malformed bootstrap datagram");
                return;
            }
        };
        for chunk in chunks {
            let view = match chunk {
                Ok(view) => view,
                Err(e) => {
                    error!(%peer, error = %e, "bad bootstrap chunk");
                    break;
                }
            };
            match view.command() {
                Some(Command::ReqBootstrapLogin) => self.bootstrap_login(peer, &view).await,
                Some(Command::ReqPing) => {
                    let mut reply = Packet::new();
                    reply.resp_ok(Command::ReqPing);
                    reply.write_u32(view.u32_at(0x10));
                    self.send_bootstrap(reply, peer).await;
                }
                Some(Command::ReqNop) => {}
                _ => {
                    warn!(%peer, command = view.command_raw(), "unexpected bootstrap command")
                }
            }
        }
    }

    async fn bootstrap_login(&mut self, peer: SocketAddr, chunk: &ChunkView<'_>) {
        let game_tag = chunk.cstr_at(0x10);
        let (game, name) = match game_tag.as_str() {
            "BombermanOnline" => {
                // Bomberman appends the password after a 0x01 byte
                let full = chunk.cstr_at(0x38);
                let name = full.split('\x01').next().unwrap_or("").to_string();
                (Game::Bomberman, name)
            }
            "PropellerA" => (Game::PropellerA, chunk.cstr_at(0x38)),
            _ => (Game::Outtrigger, game_tag),
        };
        let id = self.next_user_id;
        self.next_user_id += 1;

        let server = &mut self.games[game.index()];
        let port = server.port;
        let mut player = Player::new(id, peer);
        player.name = name.clone();
        server.add_player(player).await;
        info!(?game, player = %name, id, %peer, "bootstrap login");

        let mut reply = Packet::new();
        reply.init(Command::RspLoginSuccess2);
        reply.write_u32(port as u32);
        reply.write_u32(0);
        reply.write_u32(id);
        if reply.finalize().is_ok() {
            // the reply is addressed with the client's temporary id
            reply.patch_u32(4, chunk.u32_at(4));
        }
        self.send_bootstrap(reply, peer).await;
    }

    async fn send_bootstrap(&self, mut packet: Packet, peer: SocketAddr) {
        let len = match packet.finalize() {
            Ok(len) => len,
            Err(e) => {
                error!(%peer, error = %e, "dropping oversized bootstrap reply");
                return;
            }
        };
        debug_assert_eq!(len, packet.datagram().len());
        if let Err(e) = self.bootstrap_socket.send_to(packet.datagram(), peer).await {
            warn!(%peer, error = %e, "bootstrap send failed");
        }
    }
}
