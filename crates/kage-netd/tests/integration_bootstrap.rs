mod common;

use common::*;
use kage_netproto::command::{Command, FLAG_UNKNOWN};

#[tokio::test]
async fn outtrigger_bootstrap_assigns_first_user_id() {
    let server = spawn_server().await;
    let client = Client::new().await;

    let login = Req::new(Command::ReqBootstrapLogin)
        .u32_at(4, 0xbeef)
        .str_at(0x10, "PlayerOne")
        .build();
    client.send(server.bootstrap, &login).await;

    let reply = client
        .recv_matching(|c| is_cmd(c, Command::RspLoginSuccess2))
        .await;
    let chunks = chunks_of(&reply);
    assert_eq!(chunks.len(), 1);
    let chunk = &chunks[0];
    // payload: game port, reserved, first user id
    assert_eq!(chunk.u32_at(0x10), server.outtrigger.port() as u32);
    assert_eq!(chunk.u32_at(0x14), 0);
    assert_eq!(chunk.u32_at(0x18), 0x1001);
    // the reply is addressed with the client's temporary id
    assert_eq!(chunk.player_id(), 0xbeef);
    assert_eq!(chunk.flags(), FLAG_UNKNOWN);

    // the player now exists on the Outtrigger server: the lobby login
    // answers with the same user id
    let lobby_login = Req::new(Command::ReqLobbyLogin)
        .str_at(0x20, "PlayerOne")
        .build();
    client.send(server.outtrigger, &lobby_login).await;
    let reply = client
        .recv_matching(|c| is_cmd(c, Command::RspLoginSuccess2))
        .await;
    let chunks = chunks_of(&reply);
    assert_eq!(chunks[0].u32_at(0x10), server.outtrigger.port() as u32);
    assert_eq!(chunks[0].u32_at(0x18), 0x1001);
}

#[tokio::test]
async fn bootstrap_routes_by_game_identifier() {
    let server = spawn_server().await;

    let bm = Client::new().await;
    let login = Req::new(Command::ReqBootstrapLogin)
        .str_at(0x10, "BombermanOnline")
        .str_at(0x38, "Bob\u{1}secret")
        .build();
    bm.send(server.bootstrap, &login).await;
    let reply = bm
        .recv_matching(|c| is_cmd(c, Command::RspLoginSuccess2))
        .await;
    assert_eq!(
        chunks_of(&reply)[0].u32_at(0x10),
        server.bomberman.port() as u32
    );

    let propeller = Client::new().await;
    let login = Req::new(Command::ReqBootstrapLogin)
        .str_at(0x10, "PropellerA")
        .str_at(0x38, "Prop")
        .build();
    propeller.send(server.bootstrap, &login).await;
    let reply = propeller
        .recv_matching(|c| is_cmd(c, Command::RspLoginSuccess2))
        .await;
    assert_eq!(
        chunks_of(&reply)[0].u32_at(0x10),
        server.propeller.port() as u32
    );
}

#[tokio::test]
async fn bootstrap_ping_echoes_first_word() {
    let server = spawn_server().await;
    let client = Client::new().await;

    let ping = Req::new(Command::ReqPing).u32_at(0x10, 0x12345678).build();
    client.send(server.bootstrap, &ping).await;
    let reply = client
        .recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqPing))
        .await;
    assert_eq!(chunks_of(&reply)[0].u32_at(0x14), 0x12345678);
}

#[tokio::test]
async fn malformed_datagrams_are_dropped() {
    let server = spawn_server().await;
    let client = Client::new().await;

    // too small to even carry a chunk and a tag
    client.send(server.bootstrap, &[0u8; 8]).await;
    client
        .expect_silence(std::time::Duration::from_millis(300))
        .await;

    // the endpoint is still alive
    let ping = Req::new(Command::ReqPing).u32_at(0x10, 7).build();
    client.send(server.bootstrap, &ping).await;
    client
        .recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqPing))
        .await;
}
