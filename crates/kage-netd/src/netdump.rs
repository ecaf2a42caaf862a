//! Per-room network capture files.
//!
//! When enabled, every datagram received from a player in a room is
//! appended to that room's capture file as
//! `{ms_since_epoch:8, ipv4:4, port:2, len:4, bytes}` with host-order
//! integers. File name is `DD_HH-MM-SS_<room>.dmp` with `/` replaced
//! by `_`.

use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Datelike, Local, Timelike};
use tracing::warn;

pub(crate) struct NetDump {
    file: std::fs::File,
}

impl NetDump {
    pub fn create(room_name: &str) -> Option<NetDump> {
        let now = Local::now();
        let mut fname = format!(
            "{:02}_{:02}-{:02}-{:02}_{}.dmp",
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            room_name
        );
        fname = fname.replace('/', "_");
        match std::fs::File::create(&fname) {
            Ok(file) => Some(NetDump { file }),
            Err(e) => {
                warn!(file = fname, error = %e, "can't open netdump file");
                None
            }
        }
    }

    pub fn write(&mut self, data: &[u8], peer: SocketAddr) {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let addr = match peer.ip() {
            IpAddr::V4(v4) => v4.octets(),
            IpAddr::V6(_) => [0; 4],
        };
        let mut record = Vec::with_capacity(18 + data.len());
        record.extend_from_slice(&ms.to_ne_bytes());
        record.extend_from_slice(&addr);
        record.extend_from_slice(&peer.port().to_ne_bytes());
        record.extend_from_slice(&(data.len() as u32).to_ne_bytes());
        record.extend_from_slice(data);
        if let Err(e) = self.file.write_all(&record) {
            warn!(error = %e, "netdump write failed");
        }
    }
}
