use serde::{Deserialize, Serialize};
use sioclient_core::Str;

/// An engine.io packet, exchanged with the server inside websocket text frames.
///
/// Binary data never goes through this type: websocket binary frames are forwarded as is
/// (with a one byte type prefix for the v3 protocol).
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Open packet sent by the server right after the websocket handshake
    Open(OpenPacket),
    /// Close packet used to close a connection
    Close,
    /// Ping packet. Sent by the server with the v4 protocol and by the client with the v3 protocol.
    Ping,
    /// Pong packet used to respond to a Ping packet
    Pong,
    /// Message packet carrying a socket.io packet
    Message(Str),
    /// Upgrade packet, unused with a websocket only transport
    Upgrade,
    /// Noop packet, unused with a websocket only transport
    Noop,
}

/// An error that occurs when parsing an engine.io packet.
#[derive(thiserror::Error, Debug)]
pub enum PacketParseError {
    /// The packet type is invalid.
    #[error("invalid packet type: {0:?}")]
    InvalidPacketType(Option<char>),
    /// The open packet could not be deserialized
    #[error("invalid open packet: {0}")]
    InvalidOpenPacket(#[from] serde_json::Error),
}

impl Packet {
    /// Get the max size the packet could have when serialized
    fn get_size_hint(&self) -> usize {
        match self {
            Packet::Open(_) => 156,
            Packet::Message(msg) => 1 + msg.len(),
            _ => 1,
        }
    }
}

/// Serialize a [Packet] to a [String] according to the Engine.IO protocol
impl From<Packet> for String {
    fn from(packet: Packet) -> String {
        let mut buffer = String::with_capacity(packet.get_size_hint());
        match packet {
            Packet::Open(open) => {
                buffer.push('0');
                if let Ok(open) = serde_json::to_string(&open) {
                    buffer.push_str(&open);
                }
            }
            Packet::Close => buffer.push('1'),
            Packet::Ping => buffer.push('2'),
            Packet::Pong => buffer.push('3'),
            Packet::Message(msg) => {
                buffer.push('4');
                buffer.push_str(&msg);
            }
            Packet::Upgrade => buffer.push('5'),
            Packet::Noop => buffer.push('6'),
        };
        buffer
    }
}

/// Deserialize a [Packet] from a [Str] according to the Engine.IO protocol
impl TryFrom<Str> for Packet {
    type Error = PacketParseError;
    fn try_from(value: Str) -> Result<Self, Self::Error> {
        let packet_type = value
            .as_bytes()
            .first()
            .ok_or(PacketParseError::InvalidPacketType(None))?;
        let res = match packet_type {
            b'0' => Packet::Open(serde_json::from_str(value.slice(1..).as_str())?),
            b'1' => Packet::Close,
            // `2probe` / `3probe` are only used to upgrade a polling transport.
            b'2' => Packet::Ping,
            b'3' => Packet::Pong,
            b'4' => Packet::Message(value.slice(1..)),
            b'5' => Packet::Upgrade,
            b'6' => Packet::Noop,
            c => Err(PacketParseError::InvalidPacketType(Some(*c as char)))?,
        };
        Ok(res)
    }
}

impl TryFrom<String> for Packet {
    type Error = PacketParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Packet::try_from(Str::from(value))
    }
}

/// An OpenPacket is sent by the server to initiate a connection
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenPacket {
    /// The session ID.
    pub sid: Str,
    /// The list of available transport upgrades.
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// The ping interval, used in the heartbeat mechanism (in milliseconds).
    pub ping_interval: u64,
    /// The ping timeout, used in the heartbeat mechanism (in milliseconds).
    pub ping_timeout: u64,
    /// The maximum number of bytes per chunk. v3 servers do not send it.
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// This default implementation should only be used for testing purposes.
impl Default for OpenPacket {
    fn default() -> Self {
        Self {
            sid: Str::from("AAAAAAAAAAAAAAAA"),
            upgrades: vec![],
            ping_interval: 25000,
            ping_timeout: 20000,
            max_payload: Some(100000),
        }
    }
}
