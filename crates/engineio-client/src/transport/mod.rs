//! The transport seam of the client.
//!
//! A [`Connector`] opens a [`Connection`]: a pair of channels carrying socket.io text and binary
//! frames, already stripped of their engine.io framing. The connection is closed by dropping
//! its sender, and the connector reports the end of the connection by closing the receiver.
use bytes::Bytes;
use futures_core::future::BoxFuture;
use http::HeaderMap;
use sioclient_core::Str;
use tokio::sync::mpsc;

use crate::{errors::TransportError, protocol::ProtocolVersion};

pub mod ws;

/// A frame exchanged over the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A text frame carrying an encoded socket.io packet
    Text(Str),
    /// A binary frame carrying a binary attachment
    Binary(Bytes),
}

/// An open engine.io connection.
#[derive(Debug)]
pub struct Connection {
    /// The engine.io session id
    pub sid: Str,
    /// Frames to send to the server. Dropping it closes the connection.
    pub tx: mpsc::UnboundedSender<Message>,
    /// Frames received from the server. A transport error is yielded once, right before the end
    /// of the stream.
    pub rx: mpsc::UnboundedReceiver<Result<Message, TransportError>>,
}

/// Everything needed to open a connection.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// The full websocket url: `ws(s)://<authority><path>/?EIO=<v>&transport=websocket[&<query>]`
    pub url: String,
    /// Extra headers sent with the websocket handshake request
    pub headers: HeaderMap,
    /// The engine.io protocol version
    pub protocol: ProtocolVersion,
}

impl ConnectRequest {
    /// Build the request for an endpoint such as `http://localhost:3000`.
    ///
    /// `http` and `https` endpoints are mapped to `ws` and `wss`. The endpoint query, if any,
    /// is kept and the `query` parameter is appended to it.
    pub fn new(
        endpoint: &str,
        path: &str,
        protocol: ProtocolVersion,
        query: Option<&str>,
        headers: HeaderMap,
    ) -> Result<Self, TransportError> {
        let invalid = || TransportError::InvalidUrl(endpoint.to_string());
        let uri: http::Uri = endpoint.parse().map_err(|_| invalid())?;
        let scheme = match uri.scheme_str() {
            Some("http" | "ws") => "ws",
            Some("https" | "wss") => "wss",
            _ => return Err(invalid()),
        };
        let authority = uri.authority().ok_or_else(invalid)?;

        let path = path.trim_end_matches('/');
        let slash = if path.starts_with('/') || path.is_empty() {
            ""
        } else {
            "/"
        };
        let mut url =
            format!("{scheme}://{authority}{slash}{path}/?EIO={protocol}&transport=websocket");
        for query in [uri.query(), query].into_iter().flatten() {
            let query = query.trim_start_matches(['?', '&']);
            if !query.is_empty() {
                url.push('&');
                url.push_str(query);
            }
        }

        Ok(Self {
            url,
            headers,
            protocol,
        })
    }
}

/// Opens connections to an engine.io server.
///
/// The default implementation is the websocket [`WsConnector`](ws::WsConnector).
pub trait Connector: Send + Sync + 'static {
    /// Open a new connection. The returned future resolves once the engine.io handshake is done.
    fn connect(
        &self,
        req: ConnectRequest,
    ) -> BoxFuture<'static, Result<Connection, TransportError>>;
}
