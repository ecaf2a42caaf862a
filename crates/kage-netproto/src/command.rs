//! Top-level command bytes and chunk flag bits.

/// Relay request: the payload should be forwarded to peers.
pub const FLAG_RELAY: u16 = 0x0400;
/// Another chunk follows this one in the same datagram.
pub const FLAG_CONTINUE: u16 = 0x0800;
/// The operation targets the lobby rather than the current room.
pub const FLAG_LOBBY: u16 = 0x1000;
/// Always set by clients and on freshly initialized packets.
pub const FLAG_UNKNOWN: u16 = 0x2000;
/// The ack field at chunk offset 0x0c is valid.
pub const FLAG_ACK: u16 = 0x4000;
/// Reliable chunk: carries a reliable sequence number and must be acked.
pub const FLAG_RUDP: u16 = 0x8000;

/// Command byte at chunk offset 3.
///
/// The name prefix mirrors the direction: `Req*` are sent by clients,
/// `Rsp*` by the server. Unknown bytes are kept raw by the dispatch
/// layer (a reliable unknown command is NOP-acked, everything else is
/// dropped), so this enum only lists the commands the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    ReqNop = 0x00,
    ReqLobbyLogin = 0x01,
    ReqLobbyLogout = 0x02,
    ReqCreateRoom = 0x04,
    ReqJoinLobbyRoom = 0x06,
    ReqLeaveLobbyRoom = 0x07,
    ReqChgRoomStatus = 0x08,
    ReqQryUsers = 0x0a,
    ReqQryRooms = 0x0b,
    ReqChgUserProp = 0x0c,
    ReqChgUserStatus = 0x0d,
    ReqQryLobbies = 0x0e,
    ReqChat = 0x0f,
    RspTagCmd = 0x10,
    ReqGameData = 0x11,
    ReqPing = 0x14,
    RspFailed = 0x27,
    RspOk = 0x28,
    RspLoginSuccess2 = 0x29,
    ReqBootstrapLogin = 0x2c,
    RspLoginSuccess = 0x2d,
}

impl Command {
    pub fn from_u8(v: u8) -> Option<Command> {
        use Command::*;
        Some(match v {
            0x00 => ReqNop,
            0x01 => ReqLobbyLogin,
            0x02 => ReqLobbyLogout,
            0x04 => ReqCreateRoom,
            0x06 => ReqJoinLobbyRoom,
            0x07 => ReqLeaveLobbyRoom,
            0x08 => ReqChgRoomStatus,
            0x0a => ReqQryUsers,
            0x0b => ReqQryRooms,
            0x0c => ReqChgUserProp,
            0x0d => ReqChgUserStatus,
            0x0e => ReqQryLobbies,
            0x0f => ReqChat,
            0x10 => RspTagCmd,
            0x11 => ReqGameData,
            0x14 => ReqPing,
            0x27 => RspFailed,
            0x28 => RspOk,
            0x29 => RspLoginSuccess2,
            0x2c => ReqBootstrapLogin,
            0x2d => RspLoginSuccess,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
