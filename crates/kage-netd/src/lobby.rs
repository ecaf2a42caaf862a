//! Per-game lobby server: endpoint-to-player map, lobby list, room
//! arena, and the reliable send path.
//!
//! One instance exists per game port. All methods run on the server
//! loop task; timer tasks only communicate through events, so no state
//! here is ever shared across threads.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use kage_netproto::chunk::{split_datagram, ChunkView};
use kage_netproto::command::{Command, FLAG_LOBBY, FLAG_RUDP};
use kage_netproto::packet::Packet;
use kage_netproto::tag::TagCmd;
use tokio::net::UdpSocket;
use tracing::{error, info, warn};

use crate::games;
use crate::handlers;
use crate::net::event::{Event, EventTx};
use crate::netdump::NetDump;
use crate::player::Player;
use crate::presence::Presence;
use crate::room::{Lobby, Room, RoomKind, FIRST_ROOM_ID, LOBBY_ID_BASE, MAX_LOBBIES};
use crate::Game;

pub(crate) const RETRANSMIT_INTERVAL: Duration = Duration::from_millis(500);
pub(crate) const MAX_SEND_ATTEMPTS: u32 = 5;
/// Reliable packets queued behind the in-flight one. A client that
/// stops acking long enough to hit this is disconnected.
pub(crate) const MAX_REL_QUEUE: usize = 256;

/// Reply and relay packets composed while handling one datagram. Both
/// start empty and are flushed exactly once, so a handler can never
/// leak bytes into the next request.
#[derive(Default)]
pub(crate) struct Scratch {
    pub reply: Packet,
    pub relay: Packet,
    /// Set when the sender is gone (logout); stops chunk processing.
    pub finished: bool,
}

pub(crate) struct LobbyServer {
    pub game: Game,
    pub socket: Arc<UdpSocket>,
    pub port: u16,
    pub tx: EventTx,
    pub presence: Arc<Presence>,
    pub dump_net_data: bool,
    pub lobbies: Vec<Lobby>,
    pub players: HashMap<u32, Player>,
    pub by_addr: HashMap<SocketAddr, u32>,
    pub rooms: HashMap<u32, Room>,
    pub next_room_id: u32,
}

impl LobbyServer {
    pub fn new(
        game: Game,
        socket: Arc<UdpSocket>,
        port: u16,
        tx: EventTx,
        presence: Arc<Presence>,
        dump_net_data: bool,
    ) -> LobbyServer {
        let mut server = LobbyServer {
            game,
            socket,
            port,
            tx,
            presence,
            dump_net_data,
            lobbies: Vec::new(),
            players: HashMap::new(),
            by_addr: HashMap::new(),
            rooms: HashMap::new(),
            next_room_id: FIRST_ROOM_ID,
        };
        server.add_lobby("ShuMania");
        server
    }

    pub fn add_lobby(&mut self, name: &str) {
        assert!(self.lobbies.len() < MAX_LOBBIES);
        let id = LOBBY_ID_BASE + self.lobbies.len() as u32;
        self.lobbies.push(Lobby::new(id, name));
    }

    pub fn lobby(&self, id: u32) -> Option<&Lobby> {
        let idx = id.checked_sub(LOBBY_ID_BASE)? as usize;
        self.lobbies.get(idx)
    }

    pub fn lobby_mut(&mut self, id: u32) -> Option<&mut Lobby> {
        let idx = id.checked_sub(LOBBY_ID_BASE)? as usize;
        self.lobbies.get_mut(idx)
    }

    // ---- player lifecycle -------------------------------------------------

    /// Register a player created by the bootstrap endpoint. An existing
    /// player on the same endpoint is replaced.
    pub async fn add_player(&mut self, player: Player) {
        if let Some(&old) = self.by_addr.get(&player.addr) {
            warn!(
                game = ?self.game,
                id = old,
                peer = %player.addr,
                "player already in lobby server, replacing"
            );
            self.remove_player(old).await;
        }
        info!(
            game = ?self.game,
            player = %player.name,
            id = player.id,
            peer = %player.addr,
            "player joined lobby server"
        );
        self.by_addr.insert(player.addr, player.id);
        self.players.insert(player.id, player);
    }

    pub async fn remove_player(&mut self, pid: u32) {
        let Some(player) = self.players.get(&pid) else {
            return;
        };
        let (addr, name, lobby, room) = (
            player.addr,
            player.name.clone(),
            player.lobby,
            player.room,
        );
        if let Some(lobby_id) = lobby {
            self.lobby_remove_player(lobby_id, pid).await;
        } else if let Some(room_id) = room {
            self.room_remove_player(room_id, pid).await;
        }
        self.by_addr.remove(&addr);
        self.players.remove(&pid);
        info!(game = ?self.game, player = %name, id = pid, "player left lobby server");
    }

    pub async fn lobby_add_player(&mut self, lobby_id: u32, pid: u32) {
        if let Some(prev) = self.players.get(&pid).and_then(|p| p.lobby) {
            if prev != lobby_id {
                self.lobby_remove_player(prev, pid).await;
            }
        }
        let added = {
            let Some(lobby) = self.lobby_mut(lobby_id) else {
                return;
            };
            if lobby.players.contains(&pid) {
                false
            } else {
                lobby.players.push(pid);
                true
            }
        };
        if let Some(p) = self.players.get_mut(&pid) {
            p.lobby = Some(lobby_id);
        }
        if !added {
            return;
        }
        let Some(lobby) = self.lobby(lobby_id) else {
            return;
        };
        let Some(player) = self.players.get(&pid) else {
            return;
        };
        let name = player.name.clone();
        info!(game = ?self.game, player = %name, lobby = %lobby.name, "joined lobby");
        let others: Vec<String> = lobby
            .players
            .iter()
            .filter(|&&m| m != pid)
            .filter_map(|m| self.players.get(m))
            .map(|p| p.name.clone())
            .collect();
        self.presence.lobby_joined(self.game, &name, &others);
    }

    pub async fn lobby_remove_player(&mut self, lobby_id: u32, pid: u32) {
        if let Some(room_id) = self.players.get(&pid).and_then(|p| p.room) {
            self.room_remove_player(room_id, pid).await;
        }
        let peers = {
            let Some(lobby) = self.lobby_mut(lobby_id) else {
                return;
            };
            if let Some(idx) = lobby.players.iter().position(|&p| p == pid) {
                lobby.players.remove(idx);
            }
            let peers = lobby.players.clone();
            let lobby_name = lobby.name.clone();
            if let Some(p) = self.players.get_mut(&pid) {
                p.lobby = None;
                info!(game = ?self.game, player = %p.name, lobby = %lobby_name, "left lobby");
            }
            peers
        };
        let mut relay = Packet::new();
        relay.init(Command::ReqLeaveLobbyRoom);
        relay.add_flags(FLAG_LOBBY);
        relay.write_u32(pid);
        for peer in peers {
            self.send_to_player(peer, &mut relay).await;
        }
    }

    // ---- room lifecycle ---------------------------------------------------

    /// Create a room owned by `owner` in the owner's lobby. The room
    /// kind follows the game this server runs.
    pub async fn create_room(
        &mut self,
        name: String,
        attributes: u32,
        owner: u32,
        max_players: u32,
        password: String,
    ) -> Option<u32> {
        let lobby_id = self.players.get(&owner)?.lobby?;
        let id = self.next_room_id;
        self.next_room_id += 1;
        let kind = match self.game {
            Game::Bomberman => RoomKind::Bomberman(Default::default()),
            Game::Outtrigger | Game::PropellerA => RoomKind::Outtrigger(Default::default()),
        };
        let mut room = Room::new(id, lobby_id, name, attributes, kind);
        room.owner = owner;
        room.max_players = max_players;
        room.password = password;
        if self.dump_net_data {
            room.netdump = NetDump::create(&room.name);
        }
        self.rooms.insert(id, room);
        self.lobby_mut(lobby_id)?.rooms.push(id);
        self.room_add_player(id, owner).await;

        let (owner_name, room_name, others) = {
            let room = self.rooms.get(&id)?;
            let lobby = self.lobby(lobby_id)?;
            let others: Vec<String> = lobby
                .players
                .iter()
                .filter(|&&m| m != owner)
                .filter_map(|m| self.players.get(m))
                .map(|p| p.name.clone())
                .collect();
            let owner_name = self.players.get(&owner)?.name.clone();
            (owner_name, room.name.clone(), others)
        };
        self.presence
            .room_created(self.game, &owner_name, &room_name, &others);
        Some(id)
    }

    pub async fn room_add_player(&mut self, room_id: u32, pid: u32) {
        if let Some(prev) = self.players.get(&pid).and_then(|p| p.room) {
            if prev != room_id {
                self.room_remove_player(prev, pid).await;
            }
        }
        {
            let Some(room) = self.rooms.get_mut(&room_id) else {
                return;
            };
            if room.player_index(pid).is_some() {
                return;
            }
            room.players.push(pid);
            let room_name = room.name.clone();
            if let Some(p) = self.players.get_mut(&pid) {
                p.room = Some(room_id);
                info!(game = ?self.game, player = %p.name, room = %room_name, "joined room");
            }
        }
        self.update_bm_slots(room_id);
    }

    /// Remove a player from a room; destroys the room when it empties.
    /// Returns true when the room was destroyed.
    pub async fn room_remove_player(&mut self, room_id: u32, pid: u32) -> bool {
        if let Some(p) = self.players.get_mut(&pid) {
            p.room = None;
        }
        let Some(room) = self.rooms.get(&room_id) else {
            return false;
        };
        let Some(idx) = room.player_index(pid) else {
            error!(game = ?self.game, id = pid, "player to remove not found in the room");
            return false;
        };
        games::on_remove_player(self, room_id, pid, idx).await;

        let (destroyed, room_name) = {
            let Some(room) = self.rooms.get_mut(&room_id) else {
                return false;
            };
            if let Some(idx) = room.player_index(pid) {
                room.players.remove(idx);
            }
            (room.players.is_empty(), room.name.clone())
        };
        if let Some(p) = self.players.get(&pid) {
            info!(game = ?self.game, player = %p.name, room = %room_name, "left room");
        }
        self.update_bm_slots(room_id);
        if destroyed {
            let room = self.rooms.remove(&room_id).unwrap();
            if let Some(lobby) = self.lobby_mut(room.lobby_id) {
                lobby.rooms.retain(|&r| r != room_id);
            }
            info!(game = ?self.game, room = %room.name, "room deleted");
            return true;
        }

        let mut relay = Packet::new();
        relay.init(Command::ReqLeaveLobbyRoom);
        relay.write_u32(pid);
        self.send_to_members(room_id, &mut relay, None).await;

        let new_owner = {
            let Some(room) = self.rooms.get_mut(&room_id) else {
                return false;
            };
            if room.owner != pid {
                None
            } else {
                room.owner = room.players[0];
                Some((
                    room.owner,
                    room.players.len(),
                    matches!(room.kind, RoomKind::Outtrigger(_)),
                ))
            }
        };
        if let Some((owner, member_count, is_ot)) = new_owner {
            if let Some(p) = self.players.get(&owner) {
                info!(game = ?self.game, player = %p.name, room = %room_name, "new room owner");
            }
            if is_ot {
                let mut pkt = Packet::new();
                pkt.init(Command::RspTagCmd);
                pkt.add_flags(FLAG_RUDP);
                pkt.write_u32(0);
                pkt.write_u16(TagCmd::new(TagCmd::OWNER).raw());
                self.send_to_player(owner, &mut pkt).await;
                if member_count >= 2 {
                    let mut pkt = Packet::new();
                    pkt.init(Command::RspTagCmd);
                    pkt.add_flags(FLAG_RUDP);
                    pkt.write_u32(0);
                    pkt.write_u16(TagCmd::new(TagCmd::START_OK).raw());
                    self.send_to_player(owner, &mut pkt).await;
                }
            }
        }
        false
    }

    /// Store new room attributes, giving the game engine a look at the
    /// transition first (Outtrigger resets on PLAYING and arms the time
    /// limit on unlock).
    pub async fn set_room_attributes(&mut self, room_id: u32, attributes: u32) {
        let Some(room) = self.rooms.get(&room_id) else {
            return;
        };
        let old = room.attributes;
        games::on_attributes_changed(self, room_id, old, attributes).await;
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.attributes = attributes;
        }
    }

    /// Recompute Bomberman slot counts from each member's extra data.
    pub fn update_bm_slots(&mut self, room_id: u32) {
        let Some(room) = self.rooms.get(&room_id) else {
            return;
        };
        if !matches!(room.kind, RoomKind::Bomberman(_)) {
            return;
        }
        let slots: Vec<u32> = room
            .players
            .iter()
            .map(|pid| {
                let extra = self
                    .players
                    .get(pid)
                    .map(|p| p.extra_data.as_slice())
                    .unwrap_or(&[]);
                let guests = extra
                    .get(0..4)
                    .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
                    .unwrap_or(0);
                guests + 1
            })
            .collect();
        if let Some(room) = self.rooms.get_mut(&room_id) {
            if let RoomKind::Bomberman(bm) = &mut room.kind {
                bm.slots = slots;
            }
        }
    }

    // ---- datagram handling ------------------------------------------------

    pub async fn handle_datagram(&mut self, peer: SocketAddr, data: &[u8]) {
        // Room capture sees every datagram, valid or not.
        if let Some(&pid) = self.by_addr.get(&peer) {
            if let Some(room_id) = self.players.get(&pid).and_then(|p| p.room) {
                if let Some(room) = self.rooms.get_mut(&room_id) {
                    if let Some(dump) = &mut room.netdump {
                        dump.write(data, peer);
                    }
                }
            }
        }
        let chunks = match split_datagram(data) {
            Ok(chunks) => chunks,
            Err(e) => {
                error!(game = ?self.game, %peer, error = %e, "dropping malformed datagram");
                return;
            }
        };
        let Some(&pid) = self.by_addr.get(&peer) else {
            warn!(game = ?self.game, %peer, "packet from unknown endpoint ignored");
            return;
        };
        if let Some(p) = self.players.get_mut(&pid) {
            p.touch();
        }
        let mut scratch = Scratch::default();
        for chunk in chunks {
            let view = match chunk {
                Ok(view) => view,
                Err(e) => {
                    error!(game = ?self.game, %peer, error = %e, "bad chunk");
                    break;
                }
            };
            self.dispatch_chunk(pid, &view, &mut scratch).await;
            if scratch.finished || !self.players.contains_key(&pid) {
                break;
            }
        }
        self.flush(pid, scratch).await;
    }

    async fn dispatch_chunk(&mut self, pid: u32, chunk: &ChunkView<'_>, scratch: &mut Scratch) {
        if games::handle_chunk(self, pid, chunk, scratch).await {
            return;
        }
        handlers::dispatch(self, pid, chunk, scratch).await;
    }

    /// Flush the accumulated reply to the sender and the relay to the
    /// lobby or room peers, depending on the relay's `FLAG_LOBBY`.
    async fn flush(&mut self, pid: u32, mut scratch: Scratch) {
        if !self.players.contains_key(&pid) {
            return;
        }
        if !scratch.reply.is_empty() {
            self.send_to_player(pid, &mut scratch.reply).await;
        }
        if scratch.relay.is_empty() {
            return;
        }
        let peers: Vec<u32> = if scratch.relay.flags() & FLAG_LOBBY != 0 {
            self.players
                .get(&pid)
                .and_then(|p| p.lobby)
                .and_then(|l| self.lobby(l))
                .map(|l| l.players.iter().copied().filter(|&p| p != pid).collect())
                .unwrap_or_default()
        } else {
            self.players
                .get(&pid)
                .and_then(|p| p.room)
                .and_then(|r| self.rooms.get(&r))
                .map(|r| r.players.iter().copied().filter(|&p| p != pid).collect())
                .unwrap_or_default()
        };
        for peer in peers {
            self.send_to_player(peer, &mut scratch.relay).await;
        }
    }

    // ---- send path --------------------------------------------------------

    /// Stamp player id and sequence numbers into a finalized packet and
    /// transmit it. A packet containing any reliable chunk goes through
    /// the reliable pipeline; the first reliable chunk claims a fresh
    /// sequence and later reliable chunks in the same packet inherit it.
    pub async fn send_to_player(&mut self, pid: u32, packet: &mut Packet) {
        if let Err(e) = packet.finalize() {
            error!(game = ?self.game, error = %e, "dropping oversized packet");
            return;
        }
        let Some(player) = self.players.get_mut(&pid) else {
            return;
        };
        let offsets: Vec<usize> = packet.chunk_offsets().collect();
        let mut reliable: Option<u32> = None;
        for off in offsets {
            let flags = packet.chunk_flags_at(off);
            let cmd = packet.chunk_command_at(off);
            if flags & FLAG_RUDP != 0 {
                if reliable.is_none() {
                    packet.patch_u32(off + 8, player.rel_seq);
                    reliable = Some(player.rel_seq);
                    player.rel_seq = player.rel_seq.wrapping_add(1);
                }
            } else if cmd != Command::ReqNop.as_u8() {
                // unreliable NOPs don't carry a sequence
                packet.patch_u32(off + 8, player.unrel_seq);
                player.unrel_seq = player.unrel_seq.wrapping_add(1);
            }
            packet.patch_u32(off + 4, player.id);
        }
        let addr = player.addr;
        let bytes = Bytes::copy_from_slice(packet.datagram());
        match reliable {
            Some(seq) => self.send_reliable(pid, seq, bytes).await,
            None => self.transmit(&bytes, addr).await,
        }
    }

    async fn send_reliable(&mut self, pid: u32, seq: u32, bytes: Bytes) {
        let Some(player) = self.players.get_mut(&pid) else {
            return;
        };
        if seq as i64 == player.acked_rel_seq + 1 {
            player.in_flight = Some(bytes);
            player.send_count = 0;
            self.start_transmission(pid).await;
        } else if player.rel_queue.len() >= MAX_REL_QUEUE {
            warn!(
                game = ?self.game,
                player = %player.name,
                id = pid,
                "reliable queue overflow, disconnecting"
            );
            let _ = self.tx.try_send(Event::Disconnect {
                game: self.game,
                player_id: pid,
            });
        } else {
            player.rel_queue.push_back((seq, bytes));
        }
    }

    /// One transmission attempt of the in-flight packet, with the
    /// retransmit timer armed behind it.
    async fn start_transmission(&mut self, pid: u32) {
        let Some(player) = self.players.get_mut(&pid) else {
            return;
        };
        let Some(bytes) = player.in_flight.clone() else {
            return;
        };
        player.send_count += 1;
        let addr = player.addr;
        let epoch = player.retx_epoch;
        self.transmit(&bytes, addr).await;

        let tx = self.tx.clone();
        let game = self.game;
        tokio::spawn(async move {
            tokio::time::sleep(RETRANSMIT_INTERVAL).await;
            let _ = tx
                .send(Event::Retransmit {
                    game,
                    player_id: pid,
                    epoch,
                })
                .await;
        });
    }

    /// Retransmit timer fired. After [`MAX_SEND_ATTEMPTS`] the sequence
    /// is treated as implicitly acknowledged and the queue advances.
    pub async fn on_retransmit(&mut self, pid: u32, epoch: u64) {
        let Some(player) = self.players.get_mut(&pid) else {
            return;
        };
        if player.retx_epoch != epoch || player.in_flight.is_none() {
            return;
        }
        if player.send_count >= MAX_SEND_ATTEMPTS {
            let cmd = player.in_flight.as_ref().map(|b| b[3]).unwrap_or(0);
            warn!(
                game = ?self.game,
                player = %player.name,
                command = cmd,
                attempts = player.send_count,
                "reliable send failed, giving up"
            );
            player.acked_rel_seq += 1;
            player.in_flight = None;
            player.cancel_retransmit();
            self.promote_next(pid).await;
            return;
        }
        self.start_transmission(pid).await;
    }

    /// Peer acknowledged a reliable sequence. Duplicate or stale acks
    /// are no-ops.
    pub async fn on_ack(&mut self, pid: u32, seq: u32) {
        {
            let Some(player) = self.players.get_mut(&pid) else {
                return;
            };
            if (seq as i64) <= player.acked_rel_seq {
                return;
            }
            player.acked_rel_seq = seq as i64;
            player.in_flight = None;
            player.cancel_retransmit();
        }
        self.promote_next(pid).await;
        let notify = {
            let Some(player) = self.players.get_mut(&pid) else {
                return;
            };
            if player.waiting_for_seq == Some(seq) {
                player.waiting_for_seq = None;
                player.room
            } else {
                None
            }
        };
        if let Some(room_id) = notify {
            games::rudp_acked(self, room_id, pid).await;
        }
    }

    async fn promote_next(&mut self, pid: u32) {
        let Some(player) = self.players.get_mut(&pid) else {
            return;
        };
        let in_order = matches!(
            player.rel_queue.front(),
            Some(&(seq, _)) if seq as i64 == player.acked_rel_seq + 1
        );
        if !in_order {
            return;
        }
        let (_, bytes) = player.rel_queue.pop_front().unwrap();
        player.in_flight = Some(bytes);
        player.send_count = 0;
        self.start_transmission(pid).await;
    }

    async fn transmit(&self, bytes: &[u8], addr: SocketAddr) {
        if let Err(e) = self.socket.send_to(bytes, addr).await {
            warn!(game = ?self.game, %addr, error = %e, "send failed");
        }
    }

    /// Send one packet to every room member, re-stamping sequences per
    /// recipient.
    pub async fn send_to_members(&mut self, room_id: u32, packet: &mut Packet, except: Option<u32>) {
        let members: Vec<u32> = match self.rooms.get(&room_id) {
            Some(room) => room
                .players
                .iter()
                .copied()
                .filter(|&p| Some(p) != except)
                .collect(),
            None => return,
        };
        for pid in members {
            self.send_to_player(pid, packet).await;
        }
    }

    // ---- liveness ---------------------------------------------------------

    /// Periodic sweep: drop timed-out players, and ping recently active
    /// in-lobby players with a reliable NOP to keep acks flowing.
    pub async fn sweep(&mut self) {
        let now = Instant::now();
        let mut timeouts = Vec::new();
        let mut pings = Vec::new();
        for (&pid, player) in &self.players {
            if player.timed_out(now) {
                timeouts.push(pid);
            } else if player.room.is_none()
                && player.last_seen + Duration::from_secs(30) >= now
            {
                pings.push(pid);
            }
        }
        for pid in timeouts {
            if let Some(p) = self.players.get(&pid) {
                info!(game = ?self.game, player = %p.name, id = pid, "player timed out");
            }
            self.remove_player(pid).await;
        }
        for pid in pings {
            if !self.players.contains_key(&pid) {
                continue;
            }
            let mut packet = Packet::new();
            packet.init(Command::ReqNop);
            packet.add_flags(FLAG_RUDP);
            self.send_to_player(pid, &mut packet).await;
        }
    }
}
