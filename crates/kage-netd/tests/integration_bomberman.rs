mod common;

use common::*;
use kage_netproto::command::{Command, FLAG_RUDP};
use kage_netproto::tag::UdpCommand;

/// Bootstrap + lobby login + join the first lobby as a Bomberman
/// client with the given guest count in its extra data.
async fn bomberman_login(client: &Client, server: &TestServer, name: &str, guests: u32) -> u32 {
    let login = Req::new(Command::ReqBootstrapLogin)
        .str_at(0x10, "BombermanOnline")
        .str_at(0x38, name)
        .build();
    client.send(server.bootstrap, &login).await;
    let reply = client
        .recv_matching(|c| is_cmd(c, Command::RspLoginSuccess2))
        .await;
    let user_id = chunks_of(&reply)[0].u32_at(0x18);

    let lobby_login = Req::new(Command::ReqLobbyLogin)
        .str_at(0x20, name)
        .u32_at(0x14, 4)
        .u32_at(0x138, guests)
        .build();
    client.send(server.bomberman, &lobby_login).await;
    client
        .recv_matching(|c| is_cmd(c, Command::RspLoginSuccess2))
        .await;

    let join = Req::new(Command::ReqJoinLobbyRoom)
        .lobby()
        .seq(1)
        .u32_at(0x10, 0x3001)
        .build();
    client.send(server.bomberman, &join).await;
    client
        .recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqJoinLobbyRoom))
        .await;
    user_id
}

/// A host with two guest pads occupies three slots; the room's player
/// count is the slot sum and the join replies enumerate every slot.
#[tokio::test]
async fn guest_slots_shape_the_room() {
    let server = spawn_server().await;
    let host = Client::new().await;
    let host_id = bomberman_login(&host, &server, "Host", 2).await;

    let create = Req::new(Command::ReqCreateRoom)
        .seq(2)
        .str_at(0x10, "BMRoom")
        .u32_at(0x20, 4)
        .u32_at(0x38, 0)
        .build();
    host.send(server.bomberman, &create).await;
    let reply = host
        .recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqCreateRoom))
        .await;
    let chunks = chunks_of(&reply);
    // RSP_OK + room status + the sub-command 8 placement block
    assert_eq!(chunks.len(), 3);
    let placement = &chunks[2];
    assert_eq!(placement.command_raw(), Command::ReqChat.as_u8());
    assert!(placement.is_reliable());
    assert_eq!(
        UdpCommand(placement.u16_at(0x10)).command(),
        UdpCommand::PLAYER_LIST
    );
    assert_eq!(placement.u32_at(0x14), host_id);
    assert_eq!(placement.u32_at(0x18), 0); // member index
    assert_eq!(placement.u32_at(0x1c), 0); // board position
    assert_eq!(placement.u32_at(0x20), 2); // guest count
    assert_eq!(placement.u32_at(0x24), host_id); // owner
    assert_eq!(placement.u32_at(0x28), 0); // owner position
    assert_eq!(placement.u32_at(0x2c), 1);
    assert_eq!(placement.u32_at(0x30), 2);
    assert_eq!(placement.u32_at(0x34), 3);
    host.send(server.bomberman, &ack_datagram(placement.seq()))
        .await;

    // the advertised player count is the slot sum: 1 + 2 guests
    let query = Req::new(Command::ReqQryRooms)
        .seq(3)
        .u32_at(0x10, 0x3001)
        .build();
    host.send(server.bomberman, &query).await;
    let reply = host
        .recv_matching(|c| is_cmd(c, Command::ReqQryRooms))
        .await;
    let chunk = &chunks_of(&reply)[0];
    assert_eq!(chunk.u32_at(0x18), 1); // one room
    assert_eq!(chunk.cstr_at(0x1c), "BMRoom");
    // bomberman order: owner then player count
    assert_eq!(chunk.u32_at(0x2c), host_id);
    assert_eq!(chunk.u32_at(0x30), 3);

    // a solo player joins: its roster block lists the host's three
    // slots and its own single one
    let guest = Client::new().await;
    let guest_id = bomberman_login(&guest, &server, "Solo", 0).await;
    let join = Req::new(Command::ReqJoinLobbyRoom)
        .seq(2)
        .u32_at(0x10, 0x2001)
        .build();
    guest.send(server.bomberman, &join).await;
    let reply = guest
        .recv_matching(|c| {
            is_cmd(c, Command::ReqChat)
                && UdpCommand(c.u16_at(0x10)).command() == UdpCommand::ROSTER
        })
        .await;
    let chunks = chunks_of(&reply);
    let placement = chunks
        .iter()
        .find(|c| {
            c.command_raw() == Command::ReqChat.as_u8()
                && UdpCommand(c.u16_at(0x10)).command() == UdpCommand::PLAYER_LIST
        })
        .expect("placement chunk");
    assert_eq!(placement.u32_at(0x18), 1); // member index
    assert_eq!(placement.u32_at(0x1c), 3); // board position after the host
    assert_eq!(placement.u32_at(0x20), 0); // no guests
    assert_eq!(placement.u32_at(0x2c), 4);

    let roster = chunks
        .iter()
        .find(|c| {
            c.command_raw() == Command::ReqChat.as_u8()
                && UdpCommand(c.u16_at(0x10)).command() == UdpCommand::ROSTER
        })
        .expect("roster chunk");
    assert_eq!(roster.u32_at(0x14), 2); // hosts
    assert_eq!(roster.u32_at(0x18), host_id);
    assert_eq!(roster.u32_at(0x1c), 3);
    assert_eq!(roster.u32_at(0x20), 0);
    assert_eq!(roster.u32_at(0x24), 1);
    assert_eq!(roster.u32_at(0x28), 2);
    assert_eq!(roster.u32_at(0x2c), guest_id);
    assert_eq!(roster.u32_at(0x30), 1);
    assert_eq!(roster.u32_at(0x34), 3);
    guest
        .send(server.bomberman, &ack_datagram(placement.seq()))
        .await;

    // the room also hears about the join through the roster relay
    let relay = host
        .recv_matching(|c| {
            is_cmd(c, Command::ReqChat)
                && UdpCommand(c.u16_at(0x10)).command() == UdpCommand::ROSTER
        })
        .await;
    let roster = chunks_of(&relay);
    let roster = roster
        .iter()
        .find(|c| UdpCommand(c.u16_at(0x10)).command() == UdpCommand::ROSTER)
        .unwrap();
    assert_eq!(roster.u32_at(0x14), 2);
    host.send(server.bomberman, &ack_datagram(roster.seq()))
        .await;
}

#[tokio::test]
async fn bomberman_ping_reply_bytes_are_fixed() {
    let server = spawn_server().await;
    let client = Client::new().await;
    bomberman_login(&client, &server, "Pinger", 0).await;

    let ping = Req::new(Command::ReqChat)
        .seq(2)
        .u16_at(0x10, UdpCommand::new(UdpCommand::PING).raw())
        .u8_at(0x18, 0x05)
        .build();
    client.send(server.bomberman, &ping).await;
    let reply = client
        .recv_matching(|c| {
            is_cmd(c, Command::ReqChat)
                && UdpCommand(c.u16_at(0x10)).command() == UdpCommand::PING
        })
        .await;
    let chunk = &chunks_of(&reply)[0];
    assert_eq!(chunk.u16_at(0x10), 0x3800);
    assert_eq!(chunk.u16_at(0x12), 0);
    assert_eq!(chunk.u32_at(0x14), 0x1000_0000);
    assert_eq!(chunk.u8_at(0x18), 0x05);
}

#[tokio::test]
async fn kick_is_forwarded_to_the_position_holder() {
    let server = spawn_server().await;
    let owner = Client::new().await;
    let victim = Client::new().await;
    bomberman_login(&owner, &server, "Owner", 0).await;
    bomberman_login(&victim, &server, "Victim", 0).await;

    let create = Req::new(Command::ReqCreateRoom)
        .seq(2)
        .str_at(0x10, "KickRoom")
        .u32_at(0x20, 4)
        .u32_at(0x38, 0)
        .build();
    owner.send(server.bomberman, &create).await;
    let reply = owner
        .recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqCreateRoom))
        .await;
    // ack the reliable placement block
    owner
        .send(server.bomberman, &ack_datagram(chunks_of(&reply)[2].seq()))
        .await;

    let join = Req::new(Command::ReqJoinLobbyRoom)
        .seq(2)
        .u32_at(0x10, 0x2001)
        .build();
    victim.send(server.bomberman, &join).await;
    let reply = victim
        .recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqJoinLobbyRoom))
        .await;
    victim
        .send(server.bomberman, &ack_datagram(chunks_of(&reply)[2].seq()))
        .await;
    let relay = owner
        .recv_matching(|c| {
            is_cmd(c, Command::ReqChat)
                && UdpCommand(c.u16_at(0x10)).command() == UdpCommand::ROSTER
        })
        .await;
    let seq = chunks_of(&relay)
        .iter()
        .find(|c| UdpCommand(c.u16_at(0x10)).command() == UdpCommand::ROSTER)
        .unwrap()
        .seq();
    owner.send(server.bomberman, &ack_datagram(seq)).await;

    // kick position 1 (the victim's slot)
    let kick = Req::new(Command::ReqChat)
        .flags(FLAG_RUDP)
        .seq(3)
        .u16_at(0x10, UdpCommand::new(UdpCommand::KICK).raw())
        .u8_at(0x14, 1)
        .build();
    owner.send(server.bomberman, &kick).await;

    let forwarded = victim
        .recv_matching(|c| {
            is_cmd(c, Command::ReqChat)
                && c.is_reliable()
                && UdpCommand(c.u16_at(0x10)).command() == UdpCommand::KICK
        })
        .await;
    let chunk = &chunks_of(&forwarded)[0];
    assert_eq!(chunk.u16_at(0x10), 0x0e00);
    // the position rides along as a little-endian word
    assert_eq!(chunk.slice_at(0x14, 4), &[1, 0, 0, 0]);
    victim
        .send(server.bomberman, &ack_datagram(chunk.seq()))
        .await;
}
