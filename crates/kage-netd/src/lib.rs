//! Server library - the event loop and its wiring, extracted for
//! integration testing.
//!
//! All mutable state lives on one task: UDP reader tasks, retransmit
//! timers, room tick timers and the liveness sweep communicate with it
//! exclusively through [`net::event::Event`]s. Handlers therefore
//! never need locks, and ordering follows event arrival.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::Settings;
use crate::lobby::LobbyServer;
use crate::net::event::{Event, EventTx, Service};
use crate::net::udp::{run_sweep_timer, run_udp_listener};
use crate::presence::Presence;

mod bootstrap;
pub mod config;
mod games;
mod handlers;
mod lobby;
pub mod net;
mod netdump;
mod player;
mod presence;
mod room;

/// First user id handed out by the bootstrap endpoint.
const FIRST_USER_ID: u32 = 0x1001;

/// Liveness sweep interval.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Game {
    Bomberman,
    Outtrigger,
    PropellerA,
}

impl Game {
    pub const ALL: [Game; 3] = [Game::Bomberman, Game::Outtrigger, Game::PropellerA];

    pub fn title(self) -> &'static str {
        match self {
            Game::Bomberman => "Bomberman Online",
            Game::Outtrigger => "Outtrigger",
            Game::PropellerA => "Propeller Arena",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Game::Bomberman => 0,
            Game::Outtrigger => 1,
            Game::PropellerA => 2,
        }
    }
}

pub struct ServerOptions {
    pub bind_addr: IpAddr,
    pub bootstrap_port: u16,
    pub bomberman_port: u16,
    pub outtrigger_port: u16,
    pub propeller_port: u16,
    pub settings: Settings,
    /// Write per-room netdump capture files.
    pub dump_net_data: bool,
}

impl Default for ServerOptions {
    fn default() -> ServerOptions {
        ServerOptions {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            bootstrap_port: 9090,
            bomberman_port: 9091,
            outtrigger_port: 9092,
            propeller_port: 9093,
            settings: Settings::default(),
            dump_net_data: false,
        }
    }
}

pub(crate) struct ServerState {
    pub(crate) tx: EventTx,
    pub(crate) next_user_id: u32,
    pub(crate) bootstrap_socket: Arc<UdpSocket>,
    pub(crate) games: [LobbyServer; 3],
}

impl ServerState {
    pub(crate) async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Datagram {
                service: Service::Bootstrap,
                peer,
                data,
            } => self.handle_bootstrap(peer, &data).await,
            Event::Datagram {
                service: Service::Lobby(game),
                peer,
                data,
            } => self.games[game.index()].handle_datagram(peer, &data).await,
            Event::Retransmit {
                game,
                player_id,
                epoch,
            } => self.games[game.index()].on_retransmit(player_id, epoch).await,
            Event::Disconnect { game, player_id } => {
                self.games[game.index()].remove_player(player_id).await
            }
            Event::RoomTick {
                game,
                room_id,
                epoch,
            } => games::outtrigger::on_tick(&mut self.games[game.index()], room_id, epoch).await,
            Event::TimeLimit {
                game,
                room_id,
                epoch,
            } => {
                games::outtrigger::on_time_limit(&mut self.games[game.index()], room_id, epoch)
                    .await
            }
            Event::Sweep => {
                for server in &mut self.games {
                    server.sweep().await;
                }
            }
        }
    }
}

pub struct KageServer {
    state: ServerState,
    rx: mpsc::Receiver<Event>,
    bootstrap_addr: SocketAddr,
    lobby_addrs: [SocketAddr; 3],
}

impl KageServer {
    /// Bind all four UDP endpoints and spawn their reader tasks plus
    /// the sweep timer. The returned server must be [`run`](Self::run)
    /// to process anything.
    pub async fn bind(options: ServerOptions) -> anyhow::Result<KageServer> {
        let (tx, rx) = mpsc::channel(1024);
        let presence = Arc::new(Presence::new(options.settings.discord_webhook.clone()));

        let bootstrap_socket = Arc::new(
            UdpSocket::bind((options.bind_addr, options.bootstrap_port))
                .await
                .context("binding bootstrap port")?,
        );
        let bootstrap_addr = bootstrap_socket.local_addr()?;
        tokio::spawn(run_udp_listener(
            bootstrap_socket.clone(),
            Service::Bootstrap,
            tx.clone(),
        ));

        let ports = [
            options.bomberman_port,
            options.outtrigger_port,
            options.propeller_port,
        ];
        let mut games = Vec::with_capacity(3);
        let mut lobby_addrs = Vec::with_capacity(3);
        for game in Game::ALL {
            let socket = Arc::new(
                UdpSocket::bind((options.bind_addr, ports[game.index()]))
                    .await
                    .with_context(|| format!("binding {game:?} port"))?,
            );
            let addr = socket.local_addr()?;
            lobby_addrs.push(addr);
            tokio::spawn(run_udp_listener(
                socket.clone(),
                Service::Lobby(game),
                tx.clone(),
            ));
            games.push(LobbyServer::new(
                game,
                socket,
                addr.port(),
                tx.clone(),
                presence.clone(),
                options.dump_net_data,
            ));
            info!(?game, %addr, "lobby server listening");
        }
        tokio::spawn(run_sweep_timer(SWEEP_INTERVAL, tx.clone()));

        let games: [LobbyServer; 3] = games
            .try_into()
            .map_err(|_| anyhow::anyhow!("lobby server count"))?;
        let lobby_addrs: [SocketAddr; 3] = lobby_addrs
            .try_into()
            .map_err(|_| anyhow::anyhow!("lobby address count"))?;
        Ok(KageServer {
            state: ServerState {
                tx,
                next_user_id: FIRST_USER_ID,
                bootstrap_socket,
                games,
            },
            rx,
            bootstrap_addr,
            lobby_addrs,
        })
    }

    pub fn bootstrap_addr(&self) -> SocketAddr {
        self.bootstrap_addr
    }

    pub fn lobby_addr(&self, game: Game) -> SocketAddr {
        self.lobby_addrs[game.index()]
    }

    /// Run the event loop until every event sender is gone.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(bootstrap = %self.bootstrap_addr, "kage server started");
        while let Some(event) = self.rx.recv().await {
            self.state.handle_event(event).await;
        }
        Ok(())
    }
}
