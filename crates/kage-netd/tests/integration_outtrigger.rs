mod common;

use common::*;
use kage_netproto::command::{Command, FLAG_RUDP};
use kage_netproto::tag::TagCmd;

const PLAYING_LOCKED: u32 = 0xc000_0001;

/// Full match flow: SYS/SYS_OK/SYS2 handshake, READY/GAME_START,
/// kick-start, periodic game-data broadcast, departure mid-game.
#[tokio::test]
async fn outtrigger_match_flow() {
    let server = spawn_server().await;
    let p1 = Client::new().await;
    let p2 = Client::new().await;
    outtrigger_login(&p1, &server, "Alpha").await;
    let id2 = outtrigger_login(&p2, &server, "Beta").await;

    // room setup
    let create = Req::new(Command::ReqCreateRoom)
        .seq(2)
        .str_at(0x10, "Arena")
        .u32_at(0x20, 4)
        .u32_at(0x38, 0)
        .build();
    p1.send(server.outtrigger, &create).await;
    p1.recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqCreateRoom))
        .await;
    let join = Req::new(Command::ReqJoinLobbyRoom)
        .seq(2)
        .u32_at(0x10, 0x2001)
        .build();
    p2.send(server.outtrigger, &join).await;
    p2.recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqJoinLobbyRoom))
        .await;

    // the owner flips the room to playing: the match engine resets
    // with both members
    let playing = Req::new(Command::ReqChgRoomStatus)
        .seq(3)
        .u32_at(0x10, 0x2001)
        .u32_at(0x14, PLAYING_LOCKED)
        .build();
    p1.send(server.outtrigger, &playing).await;
    p1.recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqChgRoomStatus))
        .await;

    // SYS handshake
    let sys1_data = [0x11u8; 20];
    let sys2_data = [0x22u8; 20];
    for (client, data) in [(&p1, &sys1_data), (&p2, &sys2_data)] {
        let sys = Req::new(Command::ReqGameData)
            .flags(FLAG_RUDP)
            .seq(10)
            .u16_at(0x10, TagCmd::new(TagCmd::SYS).raw())
            .bytes_at(0x12, data)
            .build();
        client.send(server.outtrigger, &sys).await;
        let reply = client
            .recv_matching(|c| {
                is_cmd(c, Command::RspTagCmd)
                    && TagCmd(c.u16_at(0x14)).command() == TagCmd::SYS_OK
            })
            .await;
        let chunk = &chunks_of(&reply)[0];
        assert!(chunk.is_reliable());
        assert_eq!(chunk.ack(), 10);
        client
            .send(server.outtrigger, &ack_datagram(chunk.seq()))
            .await;
    }

    // once both SYS_OKs are acked, everyone gets SYS2 with all sysdata
    // and its own game position in the tag
    for (client, expect_id) in [(&p1, 0u8), (&p2, 1u8)] {
        let reply = client
            .recv_matching(|c| {
                is_cmd(c, Command::RspTagCmd)
                    && TagCmd(c.u16_at(0x14)).command() == TagCmd::SYS2
            })
            .await;
        let chunk = &chunks_of(&reply)[0];
        let tag = TagCmd(chunk.u16_at(0x14));
        assert_eq!(tag.player(), 2);
        assert_eq!(tag.id(), expect_id);
        assert_eq!(chunk.slice_at(0x16, 20), &sys1_data);
        assert_eq!(chunk.slice_at(0x2a, 20), &sys2_data);
        client
            .send(server.outtrigger, &ack_datagram(chunk.seq()))
            .await;
    }

    // READY from both, then GAME_START to everyone
    for client in [&p1, &p2] {
        let ready = Req::new(Command::ReqGameData)
            .flags(FLAG_RUDP)
            .seq(11)
            .u16_at(0x10, TagCmd::new(TagCmd::READY).raw())
            .build();
        client.send(server.outtrigger, &ready).await;
    }
    for client in [&p1, &p2] {
        let start = client
            .recv_matching(|c| {
                is_cmd(c, Command::ReqChat)
                    && c.is_reliable()
                    && TagCmd(c.u16_at(0x10)).command() == TagCmd::GAME_START
            })
            .await;
        let chunk = &chunks_of(&start)[0];
        client
            .send(server.outtrigger, &ack_datagram(chunk.seq()))
            .await;
    }

    // all GAME_START acks in: the owner gets the empty kick-start
    let kick = p1
        .recv_matching(|c| {
            is_cmd(c, Command::ReqChat) && !c.is_reliable() && c.len() == 0x14
        })
        .await;
    assert_eq!(chunks_of(&kick)[0].u32_at(0x10), 0);

    // first game data starts the periodic broadcast
    let gamedata = [0xaau8; 18];
    let sync = Req::new(Command::ReqGameData)
        .seq(12)
        .u16_at(0x10, TagCmd::new(TagCmd::SYNC).raw())
        .bytes_at(0x12, &gamedata)
        .build();
    p1.send(server.outtrigger, &sync).await;

    let mut last_frame = None;
    for _ in 0..3 {
        let frame = p2
            .recv_matching(|c| {
                is_cmd(c, Command::ReqChat) && !c.is_reliable() && c.len() == 0x10 + 2 + 36
            })
            .await;
        let chunk = &chunks_of(&frame)[0];
        let frame_num = chunk.u16_at(0x10);
        if let Some(last) = last_frame {
            assert_eq!(frame_num, last + 1, "frames must increment by one");
        } else {
            assert_eq!(frame_num, 0);
        }
        last_frame = Some(frame_num);
        // sender rows come in room order; Beta never sent game data
        assert_eq!(chunk.slice_at(0x12, 18), &gamedata);
        assert_eq!(chunk.slice_at(0x24, 18), &[0u8; 18]);
    }

    // a departure mid-game drops the row from subsequent broadcasts
    let leave = Req::new(Command::ReqLeaveLobbyRoom).seq(13).build();
    p2.send(server.outtrigger, &leave).await;
    p2.recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqLeaveLobbyRoom))
        .await;
    let relay = p1
        .recv_matching(|c| is_cmd(c, Command::ReqLeaveLobbyRoom))
        .await;
    assert_eq!(chunks_of(&relay)[0].u32_at(0x10), id2);

    let frame = p1
        .recv_matching(|c| {
            is_cmd(c, Command::ReqChat) && !c.is_reliable() && c.len() == 0x10 + 2 + 18
        })
        .await;
    assert_eq!(chunks_of(&frame)[0].slice_at(0x12, 18), &gamedata);
}

/// ECHO is answered immediately, without a sequence or ack dance.
#[tokio::test]
async fn echo_is_answered_inline() {
    let server = spawn_server().await;
    let client = Client::new().await;
    outtrigger_login(&client, &server, "Echoer").await;

    let tag = TagCmd::new(TagCmd::ECHO).raw();
    let echo = Req::new(Command::ReqGameData)
        .u16_at(0x10, tag)
        .u16_at(0x12, 0x1234)
        .build();
    client.send(server.outtrigger, &echo).await;
    let reply = client
        .recv_matching(|c| is_cmd(c, Command::RspTagCmd))
        .await;
    let chunk = &chunks_of(&reply)[0];
    assert_eq!(chunk.u32_at(0x10), 0);
    assert_eq!(chunk.u16_at(0x14), tag);
    assert_eq!(chunk.u16_at(0x16), 0x1234);
}

/// RESET broadcasts GAME_OVER and puts the room back to its
/// pre-handshake state: a new SYS is accepted again.
#[tokio::test]
async fn reset_rewinds_the_match() {
    let server = spawn_server().await;
    let p1 = Client::new().await;
    let p2 = Client::new().await;
    outtrigger_login(&p1, &server, "One").await;
    outtrigger_login(&p2, &server, "Two").await;

    let create = Req::new(Command::ReqCreateRoom)
        .seq(2)
        .str_at(0x10, "Rewind")
        .u32_at(0x20, 4)
        .u32_at(0x38, 0)
        .build();
    p1.send(server.outtrigger, &create).await;
    p1.recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqCreateRoom))
        .await;
    let join = Req::new(Command::ReqJoinLobbyRoom)
        .seq(2)
        .u32_at(0x10, 0x2001)
        .build();
    p2.send(server.outtrigger, &join).await;
    p2.recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqJoinLobbyRoom))
        .await;

    let playing = Req::new(Command::ReqChgRoomStatus)
        .seq(3)
        .u32_at(0x10, 0x2001)
        .u32_at(0x14, PLAYING_LOCKED)
        .build();
    p1.send(server.outtrigger, &playing).await;
    p1.recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqChgRoomStatus))
        .await;

    let reset = Req::new(Command::ReqGameData)
        .flags(FLAG_RUDP)
        .seq(10)
        .u16_at(0x10, TagCmd::new(TagCmd::RESET).raw())
        .build();
    p2.send(server.outtrigger, &reset).await;

    for client in [&p1, &p2] {
        let over = client
            .recv_matching(|c| {
                is_cmd(c, Command::ReqChat)
                    && c.is_reliable()
                    && TagCmd(c.u16_at(0x10)).command() == TagCmd::GAME_OVER
            })
            .await;
        let chunk = &chunks_of(&over)[0];
        client
            .send(server.outtrigger, &ack_datagram(chunk.seq()))
            .await;
    }

    // the handshake starts over
    let sys = Req::new(Command::ReqGameData)
        .flags(FLAG_RUDP)
        .seq(11)
        .u16_at(0x10, TagCmd::new(TagCmd::SYS).raw())
        .bytes_at(0x12, &[1u8; 20])
        .build();
    p1.send(server.outtrigger, &sys).await;
    let reply = p1
        .recv_matching(|c| {
            is_cmd(c, Command::RspTagCmd) && TagCmd(c.u16_at(0x14)).command() == TagCmd::SYS_OK
        })
        .await;
    assert_eq!(chunks_of(&reply)[0].ack(), 11);
}
