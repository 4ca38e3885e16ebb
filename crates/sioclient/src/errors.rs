use sioclient_core::Str;

pub use sioclient_core::parser::ParseError;
pub use sioclient_engineio::TransportError;

/// Error type for the client.
///
/// These errors are reported through the `error` and `connect_error` events rather than
/// returned, only [`Error::Transport`] can be returned when building a manager.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The transport could not be opened or failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame could not be decoded
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] ParseError),

    /// A packet was received for a namespace without socket
    #[error("unknown namespace: {0}")]
    UnknownNamespace(Str),

    /// An acknowledgement was received for an unknown ack id
    #[error("stale ack {ack_id} on namespace {ns}")]
    StaleAck {
        /// The namespace of the acknowledgement
        ns: Str,
        /// The unknown ack id
        ack_id: u64,
    },

    /// The connection was cancelled through its cancellation token
    #[error("connection cancelled")]
    Cancelled,
}

/// Error type for sending operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The event name is reserved for lifecycle events
    #[error("{0} is a reserved event name")]
    ReservedEvent(String),

    /// The socket is closed
    #[error("socket closed")]
    Closed,
}

/// Error type for ack operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AckError {
    /// The socket was closed before the acknowledgement arrived
    #[error("socket closed before the acknowledgement arrived")]
    Closed,
}
