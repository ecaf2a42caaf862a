//! Bomberman Online room handling.
//!
//! Bomberman multiplexes its own commands inside `REQ_GAME_DATA` and
//! `REQ_CHAT` via [`UdpCommand`]. Guest controllers share their host's
//! connection: each member occupies `1 + guests` slots (decoded from
//! the first dword of its extra data), and everything that talks about
//! "players" to the game counts slots, not connections.

use kage_netproto::chunk::ChunkView;
use kage_netproto::command::{Command, FLAG_CONTINUE, FLAG_RELAY, FLAG_RUDP};
use kage_netproto::packet::Packet;
use kage_netproto::tag::UdpCommand;
use tracing::{debug, error};

use super::hex_dump;
use crate::lobby::{LobbyServer, Scratch};
use crate::room::{Room, RoomKind};

#[derive(Default)]
pub(crate) struct BmState {
    /// Slot count per member, parallel to the room's player list.
    pub slots: Vec<u32>,
    /// Opaque 9-byte rule blob distributed by the owner.
    pub rules: [u8; 9],
}

impl BmState {
    pub fn slot_sum(&self) -> u32 {
        self.slots.iter().sum()
    }

    pub fn slot_count(&self, idx: usize) -> u32 {
        self.slots.get(idx).copied().unwrap_or(0)
    }

    /// First board position of the member at `idx`: the sum of the
    /// slots before it.
    pub fn position(&self, idx: usize) -> u32 {
        self.slots.iter().take(idx).sum()
    }
}

fn bm_room(room: &Room) -> Option<&BmState> {
    match &room.kind {
        RoomKind::Bomberman(bm) => Some(bm),
        RoomKind::Outtrigger(_) => None,
    }
}

pub(crate) async fn handle_chunk(
    srv: &mut LobbyServer,
    pid: u32,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) -> bool {
    if chunk.has_ack() {
        srv.on_ack(pid, chunk.ack()).await;
    }
    let sub = UdpCommand(chunk.u16_at(0x10));
    let room_id = srv.players.get(&pid).and_then(|p| p.room);

    if chunk.command_raw() == Command::ReqGameData.as_u8() {
        return game_data(srv, pid, room_id, sub, chunk, scratch).await;
    }
    if chunk.command_raw() != Command::ReqChat.as_u8() || chunk.flags() & FLAG_RELAY != 0 {
        return false;
    }

    match sub.command() {
        UdpCommand::KICK => {
            scratch.reply.init(Command::ReqNop);
            scratch.reply.ack(chunk.seq());
            if let Some(room_id) = room_id {
                kick(srv, room_id, chunk).await;
            }
        }
        UdpCommand::PING => {
            let name = player_name(srv, pid);
            debug!(player = %name, "bomberman ping");
            scratch.reply.init(Command::ReqChat);
            scratch.reply.write_u16(sub.raw());
            scratch.reply.write_u16(0);
            scratch.reply.write_u32(0x1000_0000);
            scratch.reply.write_u8(chunk.u8_at(0x18));
        }
        other => {
            error!(
                command = other,
                raw = sub.raw(),
                "unhandled chat sub-command\n{}",
                hex_dump(chunk.bytes())
            );
            return false;
        }
    }
    true
}

async fn game_data(
    srv: &mut LobbyServer,
    pid: u32,
    room_id: Option<u32>,
    sub: UdpCommand,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) -> bool {
    match sub.command() {
        UdpCommand::SET_RULES => {
            let name = player_name(srv, pid);
            debug!(player = %name, "set game rules");
            scratch.reply.init(Command::ReqNop);
            scratch.reply.ack(chunk.seq());
            if let Some(room_id) = room_id {
                if let Some(room) = srv.rooms.get_mut(&room_id) {
                    if let RoomKind::Bomberman(bm) = &mut room.kind {
                        let src = chunk.slice_at(0x14, 9);
                        bm.rules[..src.len()].copy_from_slice(src);
                    }
                }
            }
        }
        UdpCommand::START_BATTLE => {
            let name = player_name(srv, pid);
            debug!(player = %name, "start battle");
            scratch.reply.resp_ok(Command::ReqChat);
            scratch.reply.ack(chunk.seq());
            scratch.relay.init(Command::ReqChat);
            scratch.relay.add_flags(FLAG_RUDP);
        }
        UdpCommand::AGREE_RULES => {
            let name = player_name(srv, pid);
            debug!(player = %name, "agree new rules");
            if let Some(room_id) = room_id {
                let fresh = scratch.reply.is_empty();
                scratch.reply.init(Command::ReqNop);
                if fresh {
                    scratch.reply.ack(chunk.seq());
                }
                agree_rules(srv, room_id, pid, sub, chunk, scratch).await;
            }
        }
        UdpCommand::RULES_DIST => {
            let name = player_name(srv, pid);
            debug!(player = %name, "received new rules");
            scratch.reply.init(Command::ReqNop);
            scratch.reply.ack(chunk.seq());
        }
        UdpCommand::RELAY => {
            scratch.reply.init(Command::ReqNop);
            scratch.reply.ack(chunk.seq());
            scratch.relay.init(Command::ReqChat);
            scratch.relay.add_flags(FLAG_RUDP);
            scratch.relay.write_u16(sub.raw());
            scratch.relay.write_u16(chunk.u16_at(0x12));
        }
        other => {
            error!(
                command = other,
                raw = sub.raw(),
                "unhandled game-data sub-command\n{}",
                hex_dump(chunk.bytes())
            );
            return false;
        }
    }
    true
}

/// Owner agreement broadcasts the stored rules to the room; a
/// non-owner agreement sends the rule-distribution roster straight to
/// the owner.
async fn agree_rules(
    srv: &mut LobbyServer,
    room_id: u32,
    pid: u32,
    sub: UdpCommand,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let Some(room) = srv.rooms.get(&room_id) else {
        return;
    };
    let Some(bm) = bm_room(room) else {
        return;
    };
    if room.owner == pid {
        let relay = &mut scratch.relay;
        relay.init(Command::ReqChat);
        relay.add_flags(FLAG_RUDP);
        relay.write_u16(sub.raw());
        relay.write_u16(chunk.u16_at(0x12));
        relay.write_bytes(&bm.rules);
        return;
    }
    let owner = room.owner;
    let mut pkt = Packet::new();
    pkt.init(Command::ReqChat);
    pkt.add_flags(FLAG_RUDP);
    pkt.write_u16(UdpCommand::new(UdpCommand::RULES_DIST).raw());
    pkt.write_u16(0);
    pkt.write_u32(room.players.len() as u32);
    for (idx, &member) in room.players.iter().enumerate() {
        pkt.write_u32(member);
        let slots = bm.slot_count(idx);
        pkt.write_u32(slots);
        let pos = bm.position(idx);
        for i in 0..slots {
            pkt.write_u32(pos + i);
            pkt.write_u32(0xff);
        }
    }
    srv.send_to_player(owner, &mut pkt).await;
}

/// Kick by board position: forward the request to the occupant of that
/// position.
async fn kick(srv: &mut LobbyServer, room_id: u32, chunk: &ChunkView<'_>) {
    let pos = chunk.u8_at(0x14) as u32;
    let victim = {
        let Some(room) = srv.rooms.get(&room_id) else {
            return;
        };
        let Some(bm) = bm_room(room) else {
            return;
        };
        room.players
            .iter()
            .enumerate()
            .find(|&(idx, _)| bm.position(idx) == pos)
            .map(|(_, &pid)| pid)
    };
    let Some(victim) = victim else {
        return;
    };
    let mut pkt = Packet::new();
    pkt.init(Command::ReqChat);
    pkt.add_flags(FLAG_RUDP);
    pkt.write_bytes(chunk.slice_at(0x10, 4));
    // position goes out as a little-endian word, unlike the rest of
    // the protocol
    pkt.write_bytes(&pos.to_le_bytes());
    srv.send_to_player(victim, &mut pkt).await;
}

/// The composite reply a creating or joining player receives: a
/// sub-command 8 block describing its own placement, plus (for
/// non-owners) a roster block, plus a roster relay for the room.
pub(crate) fn join_room_reply(srv: &LobbyServer, room_id: u32, pid: u32, scratch: &mut Scratch) {
    let Some(room) = srv.rooms.get(&room_id) else {
        return;
    };
    let Some(bm) = bm_room(room) else {
        return;
    };
    let Some(idx) = room.player_index(pid) else {
        return;
    };
    let Some(owner_idx) = room.player_index(room.owner) else {
        return;
    };
    let pos = bm.position(idx);
    let slots = bm.slot_count(idx);

    let r = &mut scratch.reply;
    r.init(Command::ReqChat);
    r.add_flags(FLAG_RUDP | FLAG_CONTINUE);
    r.write_u16(UdpCommand::new(UdpCommand::PLAYER_LIST).raw());
    r.write_u16(0);
    r.write_u32(pid);
    r.write_u32(idx as u32);
    r.write_u32(pos);
    r.write_u32(slots.saturating_sub(1)); // guest count
    r.write_u32(room.owner);
    r.write_u32(bm.position(owner_idx));
    let mut p = pos;
    for _ in 0..slots {
        p += 1;
        r.write_u32(p);
    }

    if pid != room.owner {
        write_roster(&mut scratch.reply, room, bm);
    }
    write_roster(&mut scratch.relay, room, bm);
}

/// Sub-command 0xA roster: every member with its slot positions.
fn write_roster(packet: &mut Packet, room: &Room, bm: &BmState) {
    packet.init(Command::ReqChat);
    packet.add_flags(FLAG_RUDP);
    packet.write_u16(UdpCommand::new(UdpCommand::ROSTER).raw());
    packet.write_u16(0);
    packet.write_u32(room.players.len() as u32);
    for (idx, &member) in room.players.iter().enumerate() {
        packet.write_u32(member);
        let slots = bm.slot_count(idx);
        packet.write_u32(slots);
        let pos = bm.position(idx);
        for i in 0..slots {
            packet.write_u32(pos + i);
        }
    }
}

fn player_name(srv: &LobbyServer, pid: u32) -> String {
    srv.players
        .get(&pid)
        .map(|p| p.name.clone())
        .unwrap_or_default()
}
