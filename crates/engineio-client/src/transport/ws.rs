//! The websocket transport.
//!
//! [`WsConnector`] opens a websocket, reads the engine.io open packet and then spawns a driver
//! task that owns the websocket. The driver forwards frames between the websocket and the
//! [`Connection`] channels and runs the heartbeat:
//! * v4: the server sends pings, the connection is closed if no ping arrives within
//!   `ping_interval + ping_timeout`.
//! * v3: the client sends a ping every `ping_interval` and the server must respond within
//!   `ping_timeout`.
use std::time::Duration;

use futures_core::future::BoxFuture;
use futures_util::{SinkExt, StreamExt, TryStreamExt};
use sioclient_core::Str;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
    time::Instant,
};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{Message as WsMessage, client::IntoClientRequest},
};

use super::{ConnectRequest, Connection, Connector, Message};
use crate::{
    errors::TransportError,
    packet::{OpenPacket, Packet},
    protocol::ProtocolVersion,
};

/// Opens engine.io connections over a websocket.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(
        &self,
        req: ConnectRequest,
    ) -> BoxFuture<'static, Result<Connection, TransportError>> {
        Box::pin(connect(req))
    }
}

async fn connect(req: ConnectRequest) -> Result<Connection, TransportError> {
    let mut request = req.url.as_str().into_client_request()?;
    request.headers_mut().extend(req.headers);

    tracing::debug!(url = %req.url, "opening websocket transport");
    let (mut ws, _) = tokio_tungstenite::connect_async(request).await?;
    let open = read_open_packet(&mut ws).await?;
    tracing::debug!(
        sid = %open.sid,
        ping_interval = open.ping_interval,
        "engine.io session opened"
    );

    let (tx, internal_rx) = mpsc::unbounded_channel();
    let (internal_tx, rx) = mpsc::unbounded_channel();
    let sid = open.sid.clone();
    tokio::spawn(drive(ws, open, req.protocol, internal_rx, internal_tx));

    Ok(Connection { sid, tx, rx })
}

/// The first packet of a session must be an open packet.
async fn read_open_packet<S>(ws: &mut WebSocketStream<S>) -> Result<OpenPacket, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(msg) = ws.try_next().await? {
        match msg {
            WsMessage::Text(msg) => {
                return match Packet::try_from(Str::copy_from_slice(msg.as_str()))? {
                    Packet::Open(open) => Ok(open),
                    _ => Err(TransportError::Handshake("expected an open packet")),
                };
            }
            WsMessage::Close(_) => break,
            _ => continue,
        }
    }
    Err(TransportError::Closed)
}

/// Forwards frames between the websocket and the connection channels until one side closes.
///
/// The websocket sink is flushed only when the outgoing channel is drained.
async fn drive<S>(
    ws: WebSocketStream<S>,
    open: OpenPacket,
    protocol: ProtocolVersion,
    mut internal_rx: mpsc::UnboundedReceiver<Message>,
    internal_tx: mpsc::UnboundedSender<Result<Message, TransportError>>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let sid = open.sid;
    let mut heartbeat = Heartbeat::new(
        protocol,
        Duration::from_millis(open.ping_interval),
        Duration::from_millis(open.ping_timeout),
    );
    let (mut tx, mut rx) = ws.split();

    let res: Result<(), TransportError> = loop {
        tokio::select! {
            msg = internal_rx.recv() => {
                let Some(msg) = msg else {
                    tracing::debug!(%sid, "closing transport");
                    tx.send(encode(Packet::Close)).await.ok();
                    tx.close().await.ok();
                    break Ok(());
                };
                let res = async {
                    tx.feed(into_ws_message(msg, protocol)).await?;
                    while let Ok(msg) = internal_rx.try_recv() {
                        tx.feed(into_ws_message(msg, protocol)).await?;
                    }
                    tx.flush().await
                }
                .await;
                if let Err(e) = res {
                    break Err(e.into());
                }
            }
            msg = rx.next() => {
                let msg = match msg {
                    Some(Ok(WsMessage::Text(msg))) => {
                        match Packet::try_from(Str::copy_from_slice(msg.as_str())) {
                            Ok(Packet::Message(msg)) => Message::Text(msg),
                            Ok(Packet::Ping) => {
                                tracing::trace!(%sid, "ping received, sending pong");
                                heartbeat.on_ping();
                                if let Err(e) = tx.send(encode(Packet::Pong)).await {
                                    break Err(e.into());
                                }
                                continue;
                            }
                            Ok(Packet::Pong) => {
                                tracing::trace!(%sid, "pong received");
                                heartbeat.on_pong();
                                continue;
                            }
                            Ok(Packet::Close) => {
                                tracing::debug!(%sid, "server closed the session");
                                break Ok(());
                            }
                            Ok(packet) => {
                                tracing::debug!(%sid, ?packet, "ignoring engine.io packet");
                                continue;
                            }
                            Err(e) => break Err(e.into()),
                        }
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        // v3 binary frames start with the message packet type.
                        if protocol == ProtocolVersion::V3 && !data.is_empty() {
                            Message::Binary(data.slice(1..))
                        } else {
                            Message::Binary(data)
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break Ok(()),
                    // ws level ping/pong are answered by tungstenite
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Err(e.into()),
                };
                if internal_tx.send(Ok(msg)).is_err() {
                    // The connection was dropped by its owner
                    break Ok(());
                }
            }
            _ = tokio::time::sleep_until(heartbeat.deadline) => {
                match heartbeat.on_deadline() {
                    Ok(()) => {
                        tracing::trace!(%sid, "emitting ping");
                        if let Err(e) = tx.send(encode(Packet::Ping)).await {
                            break Err(e.into());
                        }
                    }
                    Err(e) => break Err(e),
                }
            }
        }
    };

    match res {
        Ok(()) => tracing::debug!(%sid, "transport closed"),
        Err(e) => {
            tracing::debug!(%sid, "transport closed with error: {e}");
            internal_tx.send(Err(e)).ok();
        }
    }
}

fn encode(packet: Packet) -> WsMessage {
    WsMessage::Text(String::from(packet).into())
}

fn into_ws_message(msg: Message, protocol: ProtocolVersion) -> WsMessage {
    match msg {
        Message::Text(data) => encode(Packet::Message(data)),
        Message::Binary(data) if protocol == ProtocolVersion::V3 => {
            // v3 protocol requires packet type as the first byte
            let mut buf = Vec::with_capacity(data.len() + 1);
            buf.push(0x04);
            buf.extend_from_slice(&data);
            WsMessage::Binary(buf.into())
        }
        Message::Binary(data) => WsMessage::Binary(data),
    }
}

/// Heartbeat deadlines of a connection.
#[derive(Debug)]
struct Heartbeat {
    protocol: ProtocolVersion,
    interval: Duration,
    timeout: Duration,
    deadline: Instant,
    awaiting_pong: bool,
}

impl Heartbeat {
    fn new(protocol: ProtocolVersion, interval: Duration, timeout: Duration) -> Self {
        let deadline = match protocol {
            ProtocolVersion::V3 => Instant::now() + interval,
            ProtocolVersion::V4 => Instant::now() + interval + timeout,
        };
        Self {
            protocol,
            interval,
            timeout,
            deadline,
            awaiting_pong: false,
        }
    }

    fn on_ping(&mut self) {
        if self.protocol == ProtocolVersion::V4 {
            self.deadline = Instant::now() + self.interval + self.timeout;
        }
    }

    fn on_pong(&mut self) {
        if self.protocol == ProtocolVersion::V3 && self.awaiting_pong {
            self.awaiting_pong = false;
            self.deadline = Instant::now() + self.interval;
        }
    }

    /// Called when the deadline is reached. Returns `Ok` if a ping must be sent.
    fn on_deadline(&mut self) -> Result<(), TransportError> {
        match self.protocol {
            ProtocolVersion::V3 if !self.awaiting_pong => {
                self.awaiting_pong = true;
                self.deadline = Instant::now() + self.timeout;
                Ok(())
            }
            _ => Err(TransportError::HeartbeatTimeout),
        }
    }
}
