//! Outtrigger match engine (also serves Propeller Arena).
//!
//! A room runs the handshake SYS → SYS_OK → SYS2, waits for READY from
//! everyone, broadcasts GAME_START, and once every GAME_START is acked
//! kick-starts the match. During play the server rebroadcasts each
//! player's game data every 66.667 ms (4 frames at 60 Hz), paced from
//! the previous expiry so the cadence never drifts. Matches end on the
//! point limit, the time limit, or when every player reported RESULT.

use kage_netproto::chunk::ChunkView;
use kage_netproto::command::{Command, FLAG_RUDP};
use kage_netproto::packet::Packet;
use kage_netproto::tag::TagCmd;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::lobby::{LobbyServer, Scratch};
use crate::net::event::Event;
use crate::room::{attrs, Room, RoomKind};

/// Game data is rebroadcast every 4 frames, like the game itself does.
const GAME_DATA_PERIOD: Duration = Duration::from_micros(66_667);

/// Match durations in seconds, indexed by the low nibble of byte 0x0d
/// of the owner's sysdata. -1 means no limit.
const TIME_LIMITS: [i32; 17] = [
    120, 140, 160, 180, 200, 220, 240, 260, 280, 300, 360, 420, 480, 600, 900, 1200, -1,
];

pub(crate) const SYSDATA_LEN: usize = 20;
pub(crate) const GAMEDATA_LEN: usize = 18;
pub(crate) const RESULT_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlayerPhase {
    Init,
    /// SYS data received.
    SysData,
    /// Our SYS_OK was acked.
    SysOk,
    /// READY received.
    Ready,
    /// GAME_START was acked.
    Started,
    /// RESULT received.
    Result,
    /// Player left mid-game.
    Gone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoomPhase {
    Init,
    /// GAME_START sent, waiting for acks.
    SyncStarted,
    InGame,
    GameOver,
    Result,
}

pub(crate) struct OtSlot {
    pub pid: u32,
    pub phase: PlayerPhase,
    pub sysdata: [u8; SYSDATA_LEN],
    pub gamedata: [u8; GAMEDATA_LEN],
    pub result: [u8; RESULT_LEN],
}

impl OtSlot {
    fn new(pid: u32) -> OtSlot {
        OtSlot {
            pid,
            phase: PlayerPhase::Init,
            sysdata: [0; SYSDATA_LEN],
            gamedata: [0; GAMEDATA_LEN],
            result: [0; RESULT_LEN],
        }
    }
}

pub(crate) struct OtState {
    pub phase: RoomPhase,
    /// One slot per player of the current match. Slots of departed
    /// players stay, marked Gone, so indices remain stable until the
    /// next reset.
    pub slots: Vec<OtSlot>,
    pub frame_num: u16,
    pub point_limit: i32,
    tick_epoch: u64,
    tick_task: Option<JoinHandle<()>>,
    limit_epoch: u64,
    limit_task: Option<JoinHandle<()>>,
}

impl Default for OtState {
    fn default() -> OtState {
        OtState {
            phase: RoomPhase::Init,
            slots: Vec::new(),
            frame_num: 0,
            point_limit: 0,
            tick_epoch: 0,
            tick_task: None,
            limit_epoch: 0,
            limit_task: None,
        }
    }
}

impl OtState {
    fn slot_mut(&mut self, pid: u32) -> Option<&mut OtSlot> {
        self.slots.iter_mut().find(|s| s.pid == pid)
    }

    fn cancel_timers(&mut self) {
        self.tick_epoch = self.tick_epoch.wrapping_add(1);
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
        self.limit_epoch = self.limit_epoch.wrapping_add(1);
        if let Some(task) = self.limit_task.take() {
            task.abort();
        }
    }

    /// Back to the pre-handshake state for the given members.
    fn reset(&mut self, members: &[u32]) {
        self.slots = members.iter().map(|&pid| OtSlot::new(pid)).collect();
        self.frame_num = 0;
        self.phase = RoomPhase::Init;
        self.cancel_timers();
    }
}

impl Drop for OtState {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

fn ot_mut(room: &mut Room) -> Option<&mut OtState> {
    match &mut room.kind {
        RoomKind::Outtrigger(ot) => Some(ot),
        RoomKind::Bomberman(_) => None,
    }
}

fn ot_ref(room: &Room) -> Option<&OtState> {
    match &room.kind {
        RoomKind::Outtrigger(ot) => Some(ot),
        RoomKind::Bomberman(_) => None,
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
    if chunk.command_raw() != Command::ReqGameData.as_u8() {
        return false;
    }
    let tag = TagCmd(chunk.u16_at(0x10));
    let room_id = srv.players.get(&pid).and_then(|p| p.room);
    match tag.command() {
        TagCmd::ECHO => {
            // sent regularly by every player in a room
            scratch.reply.init(Command::RspTagCmd);
            scratch.reply.write_u32(0);
            scratch.reply.write_bytes(chunk.slice_at(0x10, 4));
        }
        TagCmd::START_OK => start_ok(srv, pid, room_id, tag, chunk, scratch).await,
        TagCmd::SYS => sys(srv, pid, room_id, chunk, scratch).await,
        TagCmd::READY => ready(srv, pid, room_id, chunk, scratch).await,
        TagCmd::SYNC => {
            // Propeller Arena sends a reliable SYNC right after
            // creating a room
            if chunk.u8_at(0) & 0x80 != 0 {
                scratch.reply.init(Command::ReqNop);
                scratch.reply.ack(chunk.seq());
            }
            if let Some(room_id) = room_id {
                set_game_data(srv, room_id, pid, chunk).await;
            }
        }
        TagCmd::RESULT => result(srv, pid, room_id, chunk, scratch).await,
        TagCmd::RESET => {
            let name = player_name(srv, pid);
            warn!(game = ?srv.game, player = %name, "tag: RESET");
            if let Some(room_id) = room_id {
                send_game_over(srv, room_id).await;
                if let Some(room) = srv.rooms.get_mut(&room_id) {
                    let members = room.players.clone();
                    if let Some(ot) = ot_mut(room) {
                        ot.reset(&members);
                    }
                }
            }
        }
        TagCmd::TIME_OUT => {
            let name = player_name(srv, pid);
            warn!(game = ?srv.game, player = %name, "tag: TIME OUT");
        }
        other => {
            error!(game = ?srv.game, command = other, tag = tag.raw(), "unhandled tag command");
        }
    }
    true
}

async fn start_ok(
    srv: &mut LobbyServer,
    pid: u32,
    room_id: Option<u32>,
    tag: TagCmd,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    info!(game = ?srv.game, "tag: START OK");
    scratch.reply.init(Command::ReqNop);
    scratch.reply.ack(chunk.seq());
    let Some(room) = room_id.and_then(|id| srv.rooms.get(&id)) else {
        return;
    };
    if room.player_count() < 2 {
        return;
    }
    let owner = room.owner;
    // ack before anything else
    srv.send_to_player(pid, &mut scratch.reply).await;
    scratch.reply.reset();
    info!(game = ?srv.game, "sending START_OK to owner");
    let mut pkt = Packet::new();
    pkt.init(Command::RspTagCmd);
    pkt.write_u32(0);
    pkt.write_u16(tag.raw());
    pkt.add_flags(FLAG_RUDP);
    srv.send_to_player(owner, &mut pkt).await;
}

async fn sys(
    srv: &mut LobbyServer,
    pid: u32,
    room_id: Option<u32>,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let name = player_name(srv, pid);
    info!(game = ?srv.game, player = %name, "tag: SYS");
    scratch.reply.init(Command::RspTagCmd);
    scratch.reply.ack(chunk.seq());
    scratch.reply.add_flags(FLAG_RUDP);
    scratch.reply.write_u32(0);
    scratch
        .reply
        .write_u16(TagCmd::new(TagCmd::SYS_OK).raw());
    // the room advances this player once the SYS_OK above is acked
    if let Some(player) = srv.players.get_mut(&pid) {
        player.notify_room_on_ack();
    }
    let Some(room) = room_id.and_then(|id| srv.rooms.get_mut(&id)) else {
        return;
    };
    let Some(slot) = ot_mut(room).and_then(|ot| ot.slot_mut(pid)) else {
        warn!(game = ?srv.game, player = %name, "SYS from player without a match slot");
        return;
    };
    let src = chunk.slice_at(0x12, SYSDATA_LEN);
    slot.sysdata[..src.len()].copy_from_slice(src);
    slot.phase = PlayerPhase::SysData;
}

async fn ready(
    srv: &mut LobbyServer,
    pid: u32,
    room_id: Option<u32>,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let name = player_name(srv, pid);
    info!(game = ?srv.game, player = %name, "tag: READY");
    scratch.reply.init(Command::ReqNop);
    scratch.reply.ack(chunk.seq());
    let Some(room_id) = room_id else {
        return;
    };
    let all_ready = {
        let Some(room) = srv.rooms.get_mut(&room_id) else {
            return;
        };
        let Some(ot) = ot_mut(room) else {
            return;
        };
        match ot.slot_mut(pid) {
            Some(slot) => slot.phase = PlayerPhase::Ready,
            None => return,
        }
        ot.slots
            .iter()
            .all(|s| matches!(s.phase, PlayerPhase::Ready | PlayerPhase::Gone))
    };
    if !all_ready {
        return;
    }
    // ack before anything else
    srv.send_to_player(pid, &mut scratch.reply).await;
    scratch.reply.reset();

    let room_name = srv
        .rooms
        .get(&room_id)
        .map(|r| r.name.clone())
        .unwrap_or_default();
    info!(game = ?srv.game, room = %room_name, "sending GAME_START to all players");
    // Wait for the GAME_START below to be acked by everyone before
    // game data flows; arming must happen before the sends so each
    // player's watched sequence is the GAME_START's.
    let members: Vec<u32> = {
        let Some(room) = srv.rooms.get_mut(&room_id) else {
            return;
        };
        let members = room.players.clone();
        if let Some(ot) = ot_mut(room) {
            ot.phase = RoomPhase::SyncStarted;
        }
        members
    };
    for &member in &members {
        if let Some(player) = srv.players.get_mut(&member) {
            player.notify_room_on_ack();
        }
    }
    let mut pkt = Packet::new();
    pkt.init(Command::ReqChat);
    pkt.add_flags(FLAG_RUDP);
    pkt.write_u16(TagCmd::new(TagCmd::GAME_START).raw());
    srv.send_to_members(room_id, &mut pkt, None).await;
}

async fn result(
    srv: &mut LobbyServer,
    pid: u32,
    room_id: Option<u32>,
    chunk: &ChunkView<'_>,
    scratch: &mut Scratch,
) {
    let name = player_name(srv, pid);
    info!(game = ?srv.game, player = %name, "tag: RESULT");
    scratch.reply.init(Command::ReqNop);
    scratch.reply.ack(chunk.seq());
    let Some(room_id) = room_id else {
        return;
    };
    let (all_done, rows) = {
        let Some(room) = srv.rooms.get_mut(&room_id) else {
            return;
        };
        let Some(ot) = ot_mut(room) else {
            return;
        };
        let Some(slot) = ot.slot_mut(pid) else {
            return;
        };
        let src = chunk.slice_at(0x12, RESULT_LEN);
        slot.result[..src.len()].copy_from_slice(src);
        slot.phase = PlayerPhase::Result;
        let all = ot
            .slots
            .iter()
            .all(|s| matches!(s.phase, PlayerPhase::Result | PlayerPhase::Gone));
        if all {
            ot.cancel_timers();
            ot.phase = RoomPhase::Result;
        }
        let rows: Vec<[u8; RESULT_LEN]> = ot.slots.iter().map(|s| s.result).collect();
        (all, rows)
    };
    if !all_done {
        return;
    }
    // ack before anything else
    srv.send_to_player(pid, &mut scratch.reply).await;
    scratch.reply.reset();

    let room_name = srv
        .rooms
        .get(&room_id)
        .map(|r| r.name.clone())
        .unwrap_or_default();
    info!(game = ?srv.game, room = %room_name, "sending RESULT2 to all players");
    let mut pkt = Packet::new();
    pkt.init(Command::ReqChat);
    pkt.add_flags(FLAG_RUDP);
    pkt.write_u16(TagCmd::new(TagCmd::RESULT2).raw());
    for row in &rows {
        pkt.write_bytes(row);
    }
    srv.send_to_members(room_id, &mut pkt, None).await;
}

/// Store a player's game data. The first SYNC after GAME_START was
/// acked by everyone starts the periodic broadcast; afterwards the
/// point limit is checked against the score byte.
async fn set_game_data(srv: &mut LobbyServer, room_id: u32, pid: u32, chunk: &ChunkView<'_>) {
    let (first_broadcast, score_byte) = {
        let Some(room) = srv.rooms.get_mut(&room_id) else {
            return;
        };
        let Some(ot) = ot_mut(room) else {
            return;
        };
        let syncing = ot.phase == RoomPhase::SyncStarted;
        let Some(slot) = ot.slot_mut(pid) else {
            return;
        };
        let src = chunk.slice_at(0x12, GAMEDATA_LEN);
        slot.gamedata[..src.len()].copy_from_slice(src);
        (syncing, slot.gamedata[8])
    };
    if first_broadcast {
        send_game_frame(srv, room_id).await;
    }
    // 0x114 is the highest score the game reports in-game; beyond
    // 0xf6 the byte is not a score.
    let limit_reached = {
        let Some(ot) = srv.rooms.get(&room_id).and_then(ot_ref) else {
            return;
        };
        ot.point_limit > 0
            && score_byte <= 0xf6
            && (score_byte as i32 / 2 - 9) >= ot.point_limit
            && ot.phase == RoomPhase::InGame
    };
    if limit_reached {
        let (room_name, name) = (room_name(srv, room_id), player_name(srv, pid));
        let point_limit = srv
            .rooms
            .get(&room_id)
            .and_then(ot_ref)
            .map(|ot| ot.point_limit)
            .unwrap_or(0);
        info!(game = ?srv.game, room = %room_name, point_limit, player = %name, "point limit reached");
        send_game_over(srv, room_id).await;
    }
}

/// Broadcast one game-data frame to the room. The first frame (sent
/// while the room is still SyncStarted) flips it InGame and arms the
/// periodic tick; later frames come from the tick events.
async fn send_game_frame(srv: &mut LobbyServer, room_id: u32) {
    let mut pkt = Packet::new();
    {
        let Some(room) = srv.rooms.get_mut(&room_id) else {
            return;
        };
        let Some(ot) = ot_mut(room) else {
            return;
        };
        pkt.init(Command::ReqChat);
        pkt.write_u16(ot.frame_num);
        ot.frame_num = ot.frame_num.wrapping_add(1);
        for slot in &ot.slots {
            if slot.phase != PlayerPhase::Gone {
                pkt.write_bytes(&slot.gamedata);
            }
        }
        if ot.phase == RoomPhase::SyncStarted {
            ot.phase = RoomPhase::InGame;
            ot.tick_epoch = ot.tick_epoch.wrapping_add(1);
            let epoch = ot.tick_epoch;
            let tx = srv.tx.clone();
            let game = srv.game;
            let start = tokio::time::Instant::now() + GAME_DATA_PERIOD;
            let task = tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(start, GAME_DATA_PERIOD);
                loop {
                    interval.tick().await;
                    let event = Event::RoomTick {
                        game,
                        room_id,
                        epoch,
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            });
            if let Some(old) = ot.tick_task.replace(task) {
                old.abort();
            }
        }
    }
    srv.send_to_members(room_id, &mut pkt, None).await;
}

/// Periodic broadcast tick.
pub(crate) async fn on_tick(srv: &mut LobbyServer, room_id: u32, epoch: u64) {
    let current = srv
        .rooms
        .get(&room_id)
        .and_then(ot_ref)
        .map(|ot| ot.tick_epoch);
    if current != Some(epoch) {
        return;
    }
    send_game_frame(srv, room_id).await;
}

/// Match time limit expired.
pub(crate) async fn on_time_limit(srv: &mut LobbyServer, room_id: u32, epoch: u64) {
    let current = srv
        .rooms
        .get(&room_id)
        .and_then(ot_ref)
        .map(|ot| ot.limit_epoch);
    if current != Some(epoch) {
        return;
    }
    info!(game = ?srv.game, room = %room_name(srv, room_id), "time limit reached");
    send_game_over(srv, room_id).await;
}

async fn send_game_over(srv: &mut LobbyServer, room_id: u32) {
    let mut pkt = Packet::new();
    pkt.init(Command::ReqChat);
    pkt.add_flags(FLAG_RUDP);
    pkt.write_u16(TagCmd::new(TagCmd::GAME_OVER).raw());
    srv.send_to_members(room_id, &mut pkt, None).await;
    if let Some(ot) = srv.rooms.get_mut(&room_id).and_then(ot_mut) {
        ot.phase = RoomPhase::GameOver;
    }
}

/// A reliable packet this room was waiting on (SYS_OK or GAME_START)
/// got acked by `pid`.
pub(crate) async fn rudp_acked(srv: &mut LobbyServer, room_id: u32, pid: u32) {
    enum Action {
        None,
        Sys2,
        KickStart(u32),
    }
    let action = {
        let Some(room) = srv.rooms.get_mut(&room_id) else {
            return;
        };
        let owner = room.owner;
        let Some(ot) = ot_mut(room) else {
            return;
        };
        let room_phase = ot.phase;
        let Some(slot) = ot.slot_mut(pid) else {
            return;
        };
        if slot.phase == PlayerPhase::SysData {
            slot.phase = PlayerPhase::SysOk;
            let all = ot
                .slots
                .iter()
                .all(|s| matches!(s.phase, PlayerPhase::SysOk | PlayerPhase::Gone));
            if all {
                Action::Sys2
            } else {
                Action::None
            }
        } else if room_phase == RoomPhase::SyncStarted && slot.phase == PlayerPhase::Ready {
            slot.phase = PlayerPhase::Started;
            let all = ot
                .slots
                .iter()
                .all(|s| matches!(s.phase, PlayerPhase::Started | PlayerPhase::Gone));
            if all {
                Action::KickStart(owner)
            } else {
                Action::None
            }
        } else {
            Action::None
        }
    };
    match action {
        Action::None => {}
        Action::Sys2 => sys2_fanout(srv, room_id).await,
        Action::KickStart(owner) => {
            let name = player_name(srv, pid);
            info!(game = ?srv.game, room = %room_name(srv, room_id), player = %name,
                "GAME_START acked by all, kick-starting");
            // empty game data to the owner gets the match going
            let mut pkt = Packet::new();
            pkt.init(Command::ReqChat);
            pkt.write_u32(0);
            srv.send_to_player(owner, &mut pkt).await;
        }
    }
}

/// All players acked SYS_OK: send everyone the concatenated sysdata.
/// Each copy carries the recipient's own game position in the tag's id
/// field.
async fn sys2_fanout(srv: &mut LobbyServer, room_id: u32) {
    let (rows, members) = {
        let Some(room) = srv.rooms.get(&room_id) else {
            return;
        };
        let Some(ot) = ot_ref(room) else {
            return;
        };
        let rows: Vec<[u8; SYSDATA_LEN]> = ot.slots.iter().map(|s| s.sysdata).collect();
        (rows, room.players.clone())
    };
    info!(game = ?srv.game, room = %room_name(srv, room_id), "sending SYS2 to all players");
    let tag = TagCmd::new(TagCmd::SYS2).with_player(rows.len() as u8);
    let mut pkt = Packet::new();
    pkt.init(Command::RspTagCmd);
    pkt.add_flags(FLAG_RUDP);
    pkt.write_u32(0);
    pkt.write_u16(tag.raw());
    for row in &rows {
        pkt.write_bytes(row);
    }
    for (idx, &member) in members.iter().enumerate() {
        // tag word lives right after the leading zero dword
        pkt.patch_u16(0x14, tag.with_id(idx as u8).raw());
        srv.send_to_player(member, &mut pkt).await;
    }
}

/// Membership hook. A Ready player leaving during the GAME_START wait
/// counts as having acked, so the match can start without them; any
/// other departure just marks the slot Gone.
pub(crate) async fn on_remove_player(srv: &mut LobbyServer, room_id: u32, pid: u32, _idx: usize) {
    let was_ready_during_sync = {
        let Some(room) = srv.rooms.get_mut(&room_id) else {
            return;
        };
        let Some(ot) = ot_mut(room) else {
            return;
        };
        let syncing = ot.phase == RoomPhase::SyncStarted;
        let Some(slot) = ot.slot_mut(pid) else {
            return;
        };
        let was_ready = syncing && slot.phase == PlayerPhase::Ready;
        slot.phase = PlayerPhase::Gone;
        was_ready
    };
    if was_ready_during_sync {
        // synthesize the missing GAME_START ack
        let all_started = {
            let Some(ot) = srv.rooms.get(&room_id).and_then(ot_ref) else {
                return;
            };
            ot.slots
                .iter()
                .all(|s| matches!(s.phase, PlayerPhase::Started | PlayerPhase::Gone))
        };
        if all_started {
            let owner = match srv.rooms.get(&room_id) {
                Some(room) => room.owner,
                None => return,
            };
            info!(game = ?srv.game, room = %room_name(srv, room_id),
                "last straggler left, kick-starting");
            let mut pkt = Packet::new();
            pkt.init(Command::ReqChat);
            pkt.write_u32(0);
            srv.send_to_player(owner, &mut pkt).await;
        }
    }
}

/// Attribute transition hook. Setting PLAYING resets the engine for a
/// new match; unlocking a PLAYING room while in game arms the time
/// limit and decodes the point limit from the owner's sysdata.
pub(crate) async fn on_attributes_changed(
    srv: &mut LobbyServer,
    room_id: u32,
    old: u32,
    new: u32,
) {
    info!(game = ?srv.game, room = %room_name(srv, room_id), attributes = format_args!("{new:08x}"),
        "room status changed");
    let Some(room) = srv.rooms.get_mut(&room_id) else {
        return;
    };
    let owner = room.owner;
    let members = room.players.clone();
    let Some(ot) = ot_mut(room) else {
        return;
    };
    if new & attrs::PLAYING != 0 && old & attrs::PLAYING == 0 {
        ot.reset(&members);
        return;
    }
    let playing_locked = attrs::PLAYING | attrs::LOCKED;
    if ot.phase == RoomPhase::InGame
        && new & playing_locked == attrs::PLAYING
        && old & playing_locked == playing_locked
    {
        let Some(owner_slot) = ot.slots.iter().find(|s| s.pid == owner) else {
            return;
        };
        let limit = TIME_LIMITS[(owner_slot.sysdata[0x0d] & 0x0f) as usize];
        ot.limit_epoch = ot.limit_epoch.wrapping_add(1);
        if let Some(task) = ot.limit_task.take() {
            task.abort();
        }
        if limit > 0 {
            let epoch = ot.limit_epoch;
            let tx = srv.tx.clone();
            let game = srv.game;
            let task = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(limit as u64)).await;
                let _ = tx
                    .send(Event::TimeLimit {
                        game,
                        room_id,
                        epoch,
                    })
                    .await;
            });
            ot.limit_task = Some(task);
        }
        // point limit: present flag in byte 2, value in byte 3
        ot.point_limit = if owner_slot.sysdata[2] & 0x10 != 0 {
            ((owner_slot.sysdata[3] >> 2) & 0x3f) as i32
        } else {
            0
        };
        let point_limit = ot.point_limit;
        info!(
            game = ?srv.game,
            time_limit = limit,
            point_limit,
            "match started"
        );
    }
}

fn player_name(srv: &LobbyServer, pid: u32) -> String {
    srv.players
        .get(&pid)
        .map(|p| p.name.clone())
        .unwrap_or_default()
}

fn room_name(srv: &LobbyServer, room_id: u32) -> String {
    srv.rooms
        .get(&room_id)
        .map(|r| r.name.clone())
        .unwrap_or_default()
}
