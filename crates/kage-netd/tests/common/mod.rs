#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use kage_netd::{Game, KageServer, ServerOptions};
use kage_netproto::chunk::{split_datagram, ChunkView};
use kage_netproto::command::{Command, FLAG_ACK, FLAG_LOBBY, FLAG_UNKNOWN};
use kage_netproto::limits::{SERVER_TAG, SIZE_MASK};
use tokio::net::UdpSocket;
use tokio::time::timeout;

pub struct TestServer {
    pub bootstrap: SocketAddr,
    pub bomberman: SocketAddr,
    pub outtrigger: SocketAddr,
    pub propeller: SocketAddr,
}

/// Bind a server on ephemeral loopback ports and run it in the
/// background.
pub async fn spawn_server() -> TestServer {
    let server = KageServer::bind(ServerOptions {
        bind_addr: "127.0.0.1".parse().unwrap(),
        bootstrap_port: 0,
        bomberman_port: 0,
        outtrigger_port: 0,
        propeller_port: 0,
        settings: Default::default(),
        dump_net_data: false,
    })
    .await
    .unwrap();
    let test_server = TestServer {
        bootstrap: server.bootstrap_addr(),
        bomberman: server.lobby_addr(Game::Bomberman),
        outtrigger: server.lobby_addr(Game::Outtrigger),
        propeller: server.lobby_addr(Game::PropellerA),
    };
    tokio::spawn(server.run());
    test_server
}

pub struct Client {
    sock: UdpSocket,
}

impl Client {
    pub async fn new() -> Client {
        Client {
            sock: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    pub async fn send(&self, to: SocketAddr, datagram: &[u8]) {
        self.sock.send_to(datagram, to).await.unwrap();
    }

    pub async fn recv(&self) -> Option<Vec<u8>> {
        let mut buf = [0u8; 1510];
        match timeout(Duration::from_secs(2), self.sock.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
            _ => None,
        }
    }

    /// Receive datagrams until one contains a chunk matching `pred`,
    /// skipping unrelated traffic (relays, retransmissions).
    pub async fn recv_matching(&self, pred: impl Fn(&ChunkView<'_>) -> bool) -> Vec<u8> {
        for _ in 0..50 {
            let Some(datagram) = self.recv().await else {
                panic!("timed out waiting for a matching datagram");
            };
            let matched = split_datagram(&datagram)
                .map(|chunks| chunks.flatten().any(|c| pred(&c)))
                .unwrap_or(false);
            if matched {
                return datagram;
            }
        }
        panic!("no matching datagram in 50 receives");
    }

    pub async fn expect_silence(&self, wait: Duration) {
        let mut buf = [0u8; 1510];
        assert!(
            timeout(wait, self.sock.recv_from(&mut buf)).await.is_err(),
            "expected no more datagrams"
        );
    }
}

/// Parse a server datagram into chunk views.
pub fn chunks_of(datagram: &[u8]) -> Vec<ChunkView<'_>> {
    let last = datagram.len() - 4;
    assert_eq!(
        &datagram[last..],
        &SERVER_TAG.to_be_bytes(),
        "datagram missing server tag"
    );
    split_datagram(datagram)
        .unwrap()
        .map(|c| c.unwrap())
        .collect()
}

pub fn is_cmd(chunk: &ChunkView<'_>, cmd: Command) -> bool {
    chunk.command_raw() == cmd.as_u8()
}

/// `RSP_OK`/`RSP_FAILED` chunks echo the request command in the first
/// payload word.
pub fn is_resp_to(chunk: &ChunkView<'_>, resp: Command, req: Command) -> bool {
    chunk.command_raw() == resp.as_u8() && chunk.u32_at(0x10) == req.as_u8() as u32
}

/// Single-chunk request builder with absolute in-chunk offsets,
/// mirroring the fixed field layouts the games use.
pub struct Req {
    data: Vec<u8>,
    flags: u16,
    cmd: u8,
}

impl Req {
    pub fn new(cmd: Command) -> Req {
        Req {
            data: vec![0; 0x10],
            flags: FLAG_UNKNOWN,
            cmd: cmd.as_u8(),
        }
    }

    pub fn flags(mut self, extra: u16) -> Req {
        self.flags |= extra;
        self
    }

    pub fn lobby(self) -> Req {
        self.flags(FLAG_LOBBY)
    }

    pub fn seq(self, seq: u32) -> Req {
        self.u32_at(8, seq)
    }

    pub fn ack(mut self, seq: u32) -> Req {
        self.flags |= FLAG_ACK;
        self.u32_at(0x0c, seq)
    }

    pub fn bytes_at(mut self, offset: usize, bytes: &[u8]) -> Req {
        if self.data.len() < offset + bytes.len() {
            self.data.resize(offset + bytes.len(), 0);
        }
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn u8_at(self, offset: usize, v: u8) -> Req {
        self.bytes_at(offset, &[v])
    }

    pub fn u16_at(self, offset: usize, v: u16) -> Req {
        self.bytes_at(offset, &v.to_be_bytes())
    }

    pub fn u32_at(self, offset: usize, v: u32) -> Req {
        self.bytes_at(offset, &v.to_be_bytes())
    }

    pub fn str_at(self, offset: usize, s: &str) -> Req {
        self.bytes_at(offset, s.as_bytes())
    }

    pub fn build(mut self) -> Vec<u8> {
        let word = self.flags | (self.data.len() as u16 & SIZE_MASK);
        self.data[0..2].copy_from_slice(&word.to_be_bytes());
        self.data[3] = self.cmd;
        self.data.extend_from_slice(&SERVER_TAG.to_be_bytes());
        self.data
    }
}

/// Reliable-NOP ack for a server sequence number.
pub fn ack_datagram(seq: u32) -> Vec<u8> {
    Req::new(Command::ReqNop).ack(seq).build()
}

/// Bootstrap + lobby login + join the first lobby, as an Outtrigger
/// client. Returns the assigned user id.
pub async fn outtrigger_login(client: &Client, server: &TestServer, name: &str) -> u32 {
    let login = Req::new(Command::ReqBootstrapLogin)
        .str_at(0x10, name)
        .build();
    client.send(server.bootstrap, &login).await;
    let reply = client
        .recv_matching(|c| is_cmd(c, Command::RspLoginSuccess2))
        .await;
    let user_id = chunks_of(&reply)[0].u32_at(0x18);

    let lobby_login = Req::new(Command::ReqLobbyLogin)
        .str_at(0x20, name)
        .build();
    client.send(server.outtrigger, &lobby_login).await;
    client
        .recv_matching(|c| is_cmd(c, Command::RspLoginSuccess2))
        .await;

    let join = Req::new(Command::ReqJoinLobbyRoom)
        .lobby()
        .seq(1)
        .u32_at(0x10, 0x3001)
        .build();
    client.send(server.outtrigger, &join).await;
    client
        .recv_matching(|c| is_resp_to(c, Command::RspOk, Command::ReqJoinLobbyRoom))
        .await;
    user_id
}
