//! Discord webhook presence notifications.
//!
//! Notifications are fire-and-forget: each post runs on its own task,
//! at most [`MAX_IN_FLIGHT`] at a time. Excess notifications are
//! dropped rather than queued so a slow webhook can never back up the
//! server.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::warn;

use crate::Game;

const MAX_IN_FLIGHT: i32 = 5;

/// Lobby-join notifications are posted at most once per this interval.
const LOBBY_NOTIF_INTERVAL: Duration = Duration::from_secs(5 * 60);

const EMBED_COLOR: u32 = 9_118_205;

fn game_pic(game: Game) -> &'static str {
    match game {
        Game::Bomberman => "https://dcnet.flyca.st/gamepic/bomberman.jpg",
        Game::Outtrigger => "https://dcnet.flyca.st/gamepic/outtrigger.jpg",
        Game::PropellerA => "https://dcnet.flyca.st/gamepic/propeller.jpg",
    }
}

pub struct Presence {
    webhook: Option<String>,
    client: reqwest::Client,
    in_flight: Arc<AtomicI32>,
    last_lobby_post: Mutex<Option<Instant>>,
}

impl Presence {
    pub fn new(webhook: Option<String>) -> Presence {
        Presence {
            webhook,
            client: reqwest::Client::new(),
            in_flight: Arc::new(AtomicI32::new(0)),
            last_lobby_post: Mutex::new(None),
        }
    }

    pub fn lobby_joined(&self, game: Game, player: &str, others: &[String]) {
        if self.webhook.is_none() {
            return;
        }
        {
            let mut last = self.last_lobby_post.lock().unwrap();
            if let Some(t) = *last {
                if t.elapsed() < LOBBY_NOTIF_INTERVAL {
                    return;
                }
            }
            *last = Some(Instant::now());
        }
        self.post(
            game,
            format!("Player **{player}** joined the lobby"),
            others,
        );
    }

    pub fn room_created(&self, game: Game, owner: &str, room: &str, others: &[String]) {
        self.post(
            game,
            format!("Player **{owner}** created game room **{room}**"),
            others,
        );
    }

    fn post(&self, game: Game, content: String, player_list: &[String]) {
        let Some(url) = self.webhook.clone() else {
            return;
        };
        if self.in_flight.fetch_add(1, Ordering::SeqCst) >= MAX_IN_FLIGHT {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!("presence notification dropped: too many in flight");
            return;
        }
        let mut text = String::new();
        for name in player_list {
            text.push_str(name);
            text.push('\n');
        }
        let payload = json!({
            "content": content,
            "embeds": [{
                "author": {
                    "name": game.title(),
                    "icon_url": game_pic(game),
                },
                "title": "Lobby Players",
                "description": text,
                "color": EMBED_COLOR,
            }],
        });
        let client = self.client.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!(status = %resp.status(), "webhook post rejected");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "webhook post failed"),
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }
}
