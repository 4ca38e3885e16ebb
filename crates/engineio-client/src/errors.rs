use tokio_tungstenite::tungstenite;

pub use crate::packet::PacketParseError;

/// Errors that can happen while opening or running the transport.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The endpoint could not be turned into a websocket url
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Websocket error
    #[error("ws transport error: {0}")]
    Ws(#[from] Box<tungstenite::Error>),
    /// The server sent an invalid engine.io packet
    #[error("error decoding engine.io packet: {0}")]
    PacketParse(#[from] PacketParseError),
    /// The server did not start the session with an open packet
    #[error("handshake error: {0}")]
    Handshake(&'static str),
    /// The transport did not open in time
    #[error("connect timeout")]
    ConnectTimeout,
    /// The server stopped answering the heartbeat
    #[error("heartbeat timeout")]
    HeartbeatTimeout,
    /// The connection was closed
    #[error("transport closed")]
    Closed,
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        TransportError::Ws(Box::new(err))
    }
}
