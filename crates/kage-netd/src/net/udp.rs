use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use kage_netproto::limits::RECV_BUFFER_LEN;
use tokio::net::UdpSocket;
use tracing::error;

use super::event::{Event, EventTx, Service};

/// Read datagrams from `socket` and forward them to the server loop.
/// Exits when the server loop goes away.
pub async fn run_udp_listener(socket: Arc<UdpSocket>, service: Service, tx: EventTx) {
    let mut buf = [0u8; RECV_BUFFER_LEN];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                // On Linux a UDP socket can surface ICMP errors from
                // earlier sends; keep reading.
                error!(?service, error = %e, "receive failed");
                continue;
            }
        };
        let event = Event::Datagram {
            service,
            peer,
            data: Bytes::copy_from_slice(&buf[..len]),
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }
}

/// Emit a [`Event::Sweep`] on a fixed interval.
pub async fn run_sweep_timer(interval: Duration, tx: EventTx) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // immediate first tick
    loop {
        ticker.tick().await;
        if tx.send(Event::Sweep).await.is_err() {
            return;
        }
    }
}
