//! The [`Manager`] owns the transport shared by the sockets of one endpoint.
//!
//! It runs the connection state machine and the reconnection policy, it decodes every incoming
//! frame once and routes it to the socket of its namespace.
//!
//! ```text
//! Closed --open()--> Opening --transport open--> Open --transport closed--> Reconnecting
//!                       |                                                      |
//!                       +--transport failed--> Closed             retry succeeded: Open
//!                                                                 retries exhausted: Closed
//! ```
//!
//! Every state of the manager and of its sockets is owned by a [`ManagerState`] living in an
//! [`EventLoop`]. Public calls, transport frames and timers are tasks submitted to this loop.
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
    },
};

use serde_json::Value;
use sioclient_core::{
    Str,
    packet::{Packet, PacketData, ROOT_NS},
    parser::{EncodedPacket, Parse, ParseError, ParserState},
};
use sioclient_engineio::{
    ConnectRequest, Connection, Connector, Message, TransportError, WsConnector,
};
use sioclient_parser_common::CommonParser;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    ack::AckCallback,
    backoff::Backoff,
    config::{ClientConfig, ProtocolVersion},
    emitter::{Emitter, EventArgs, ListenerId},
    errors::Error,
    event_loop::{EventLoop, LoopHandle},
    socket::{DisconnectReason, Socket, SocketShared, SocketState},
};

/// The state of the transport connection of a [`Manager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// No transport. It is the initial and the terminal state.
    Closed = 0,
    /// The transport is being opened
    Opening = 1,
    /// The transport is open
    Open = 2,
    /// Waiting for the next reconnection attempt, or attempting it
    Reconnecting = 3,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Opening,
            2 => ConnectionState::Open,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Closed,
        }
    }
}

type SocketEntry = (Emitter, Arc<SocketShared>);

/// The part of the manager readable outside of its event loop.
#[derive(Debug)]
pub(crate) struct ManagerShared {
    state: AtomicU8,
    emitter: Emitter,
    sockets: Mutex<HashMap<Str, SocketEntry>>,
    connections: AtomicUsize,
    destroyed: AtomicBool,
    shutdown: CancellationToken,
    config: Arc<ClientConfig>,
}

impl ManagerShared {
    fn sockets(&self) -> MutexGuard<'_, HashMap<Str, SocketEntry>> {
        self.sockets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remove the socket entry of `ns` if it is still the one of `shared`.
    fn forget_socket(&self, ns: &str, shared: &Arc<SocketShared>) {
        let mut sockets = self.sockets();
        if sockets.get(ns).is_some_and(|(_, s)| Arc::ptr_eq(s, shared)) {
            sockets.remove(ns);
        }
    }

    /// Mark the manager destroyed if it has no socket left, including the ones
    /// requested but not yet added on the loop.
    fn release(&self) -> bool {
        let sockets = self.sockets();
        let unused = sockets.is_empty();
        if unused {
            self.destroyed.store(true, Ordering::SeqCst);
        }
        unused
    }
}

struct ConnState {
    tx: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
}

/// The state of a manager and of its sockets, owned by the manager event loop.
pub(crate) struct ManagerState {
    config: Arc<ClientConfig>,
    request: ConnectRequest,
    connector: Arc<dyn Connector>,
    shared: Arc<ManagerShared>,
    state: ConnectionState,

    conn: Option<ConnState>,
    /// Incremented each time a transport is opened or the manager is closed.
    /// Notifications from an older transport or timer are ignored.
    generation: u64,
    engine_sid: Option<Str>,
    parser: CommonParser,
    parser_state: ParserState,
    /// The server connected the root namespace on its own (protocol v4)
    root_connected: bool,

    sockets: HashMap<Str, SocketState>,
    backoff: Backoff,
    reconnecting: bool,
    skip_reconnect: bool,
    destroyed: bool,
    open_task: Option<JoinHandle<()>>,
    reconnect_task: Option<JoinHandle<()>>,
}

impl ManagerState {
    fn set_state(&mut self, state: ConnectionState) {
        tracing::trace!(from = ?self.state, to = ?state, "manager state");
        self.state = state;
        self.shared.state.store(state as u8, Ordering::SeqCst);
    }

    /// Emit an event to the manager listeners and to the listeners of every socket.
    fn emit_all(&self, event: &str, args: &EventArgs) {
        self.shared.emitter.emit(event, args);
        for socket in self.sockets.values() {
            socket.emitter.emit(event, args);
        }
    }

    fn emit_all_error(&self, event: &str, err: &Error) {
        self.emit_all(event, &EventArgs::new([Value::String(err.to_string())]));
    }

    pub(crate) fn add_socket(&mut self, mut socket: SocketState) {
        tracing::debug!(ns = %socket.ns, "adding socket");
        if self.destroyed {
            socket.destroy(None);
            return;
        }
        self.sockets.insert(socket.ns.clone(), socket);
    }

    pub(crate) fn open(&mut self, handle: &LoopHandle<Self>) {
        if self.destroyed || self.state != ConnectionState::Closed {
            return;
        }
        tracing::debug!(url = %self.request.url, "opening manager");
        self.skip_reconnect = false;
        self.set_state(ConnectionState::Opening);
        self.connect_transport(handle);
    }

    fn connect_transport(&mut self, handle: &LoopHandle<Self>) {
        self.generation += 1;
        let generation = self.generation;
        let fut = self.connector.connect(self.request.clone());
        let timeout = self.config.timeout;
        let handle = handle.clone();
        self.open_task = Some(tokio::spawn(async move {
            let res = match timeout {
                Some(timeout) => tokio::time::timeout(timeout, fut)
                    .await
                    .unwrap_or_else(|_| Err(TransportError::ConnectTimeout)),
                None => fut.await,
            };
            handle.submit(move |state, handle| state.on_connect_result(generation, res, handle));
        }));
    }

    fn on_connect_result(
        &mut self,
        generation: u64,
        res: Result<Connection, TransportError>,
        handle: &LoopHandle<Self>,
    ) {
        // A stale connection is closed when dropped
        if generation != self.generation {
            return;
        }
        self.open_task = None;
        match res {
            Ok(conn) => self.on_open(conn, handle),
            Err(err) => self.on_open_error(err, handle),
        }
    }

    fn on_open(&mut self, conn: Connection, handle: &LoopHandle<Self>) {
        let Connection { sid, tx, rx } = conn;
        tracing::debug!(%sid, "transport open");
        let reader = tokio::spawn(read_frames(self.generation, rx, handle.clone()));
        self.conn = Some(ConnState { tx, reader });
        self.engine_sid = Some(sid);
        self.parser_state.reset();
        self.root_connected = false;
        self.shared.connections.fetch_add(1, Ordering::SeqCst);
        self.set_state(ConnectionState::Open);
        self.shared.emitter.emit("open", &EventArgs::default());

        if self.reconnecting {
            let attempts = self.backoff.attempts();
            self.reconnecting = false;
            self.backoff.reset();
            self.emit_all("reconnect", &EventArgs::new([Value::from(attempts)]));
        }

        let namespaces: Vec<Str> = self
            .sockets
            .values()
            .filter(|s| s.open_requested)
            .map(|s| s.ns.clone())
            .collect();
        for ns in namespaces {
            self.send_connect(&ns, handle);
        }
    }

    fn on_open_error(&mut self, err: TransportError, handle: &LoopHandle<Self>) {
        tracing::debug!(%err, "transport open failed");
        if let (TransportError::ConnectTimeout, Some(timeout)) = (&err, self.config.timeout) {
            let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            self.emit_all("connect_timeout", &EventArgs::new([Value::from(millis)]));
        }
        let err = Error::Transport(err);
        self.set_state(ConnectionState::Closed);
        self.emit_all_error("connect_error", &err);

        if self.reconnecting {
            self.reconnecting = false;
            self.emit_all_error("reconnect_error", &err);
            self.reconnect(handle);
        } else if self.config.reconnection && self.backoff.attempts() == 0 {
            self.reconnect(handle);
        }
    }

    fn reconnect(&mut self, handle: &LoopHandle<Self>) {
        if self.reconnecting || self.skip_reconnect || self.destroyed {
            return;
        }
        let attempts = self.backoff.attempts();
        if self
            .config
            .reconnection_attempts
            .is_some_and(|max| attempts >= max)
        {
            tracing::debug!(attempts, "reconnection attempts exhausted");
            self.backoff.reset();
            self.set_state(ConnectionState::Closed);
            self.emit_all("reconnect_failed", &EventArgs::default());
            return;
        }

        let delay = self.backoff.duration();
        tracing::debug!(attempt = attempts + 1, ?delay, "scheduling reconnection");
        self.reconnecting = true;
        self.set_state(ConnectionState::Reconnecting);
        let generation = self.generation;
        let handle = handle.clone();
        self.reconnect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.submit(move |state, handle| state.on_reconnect_timer(generation, handle));
        }));
    }

    fn on_reconnect_timer(&mut self, generation: u64, handle: &LoopHandle<Self>) {
        if generation != self.generation || !self.reconnecting || self.skip_reconnect {
            return;
        }
        self.reconnect_task = None;
        let attempt = Value::from(self.backoff.attempts());
        tracing::debug!(%attempt, "attempting reconnection");
        self.emit_all("reconnect_attempt", &EventArgs::new([attempt.clone()]));
        self.emit_all("reconnecting", &EventArgs::new([attempt]));
        self.connect_transport(handle);
    }

    fn on_transport_error(&mut self, generation: u64, err: TransportError) {
        if generation != self.generation {
            return;
        }
        tracing::debug!(%err, "transport error");
        self.emit_all_error("error", &Error::Transport(err));
    }

    fn on_transport_close(
        &mut self,
        generation: u64,
        reason: DisconnectReason,
        handle: &LoopHandle<Self>,
    ) {
        if generation != self.generation {
            return;
        }
        tracing::debug!(%reason, "transport closed");
        self.cleanup();
        self.backoff.reset();
        self.set_state(ConnectionState::Closed);
        self.notify_close(reason);

        if self.config.reconnection && !self.skip_reconnect {
            self.reconnect(handle);
        }
    }

    /// Emit `close` to the manager listeners and `disconnect` to the connecting sockets.
    fn notify_close(&mut self, reason: DisconnectReason) {
        self.shared.emitter.emit("close", &reason.args());
        for socket in self.sockets.values_mut() {
            if socket.open_requested {
                socket.on_close(reason);
            }
        }
    }

    fn cleanup(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.reader.abort();
        }
        self.engine_sid = None;
        self.root_connected = false;
        self.parser_state.reset();
    }

    /// Close the transport and cancel any pending reconnection.
    pub(crate) fn close(&mut self, reason: DisconnectReason) {
        tracing::debug!(%reason, "closing manager");
        self.skip_reconnect = true;
        self.reconnecting = false;
        self.generation += 1;
        for task in [self.open_task.take(), self.reconnect_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        self.backoff.reset();
        let was_open = self.conn.is_some();
        self.cleanup();
        self.set_state(ConnectionState::Closed);
        if was_open {
            self.notify_close(reason);
        }
    }

    /// Close the manager and every socket. The manager can't be used afterwards.
    pub(crate) fn destroy(&mut self, reason: DisconnectReason, handle: &LoopHandle<Self>) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        {
            let _sockets = self.shared.sockets();
            self.shared.destroyed.store(true, Ordering::SeqCst);
        }
        self.close(reason);
        for (_, mut socket) in self.sockets.drain() {
            socket.destroy(None);
        }
        self.shared.sockets().clear();
        self.shared.shutdown.cancel();
        tracing::debug!("manager destroyed");
        handle.shutdown();
    }

    pub(crate) fn cancel(&mut self, handle: &LoopHandle<Self>) {
        tracing::debug!("manager cancelled");
        self.emit_all_error("error", &Error::Cancelled);
        self.destroy(DisconnectReason::ForcedClose, handle);
    }

    fn on_message(&mut self, generation: u64, msg: Message, handle: &LoopHandle<Self>) {
        if generation != self.generation {
            return;
        }
        let res = match msg {
            Message::Text(data) => {
                if self.parser_state.is_pending() {
                    tracing::warn!(
                        "text frame received before the end of a binary packet, discarding it"
                    );
                }
                self.parser.decode_str(&mut self.parser_state, data)
            }
            Message::Binary(data) => self.parser.decode_bin(&mut self.parser_state, data),
        };
        match res {
            Ok(packet) => self.route(packet, handle),
            Err(ParseError::NeedsMoreBinaryData) => (),
            Err(err) => {
                tracing::warn!(%err, "malformed frame");
                self.emit_all_error("error", &Error::MalformedFrame(err));
            }
        }
    }

    fn route(&mut self, packet: Packet, handle: &LoopHandle<Self>) {
        let Packet { inner, ns } = packet;
        if ns == ROOT_NS && matches!(inner, PacketData::Connect(_)) {
            self.root_connected = true;
        }
        if !self.sockets.contains_key(&ns) {
            tracing::debug!(err = %Error::UnknownNamespace(ns), "dropping packet");
            return;
        }
        match inner {
            PacketData::Connect(data) => self.on_socket_connect(&ns, data, handle),
            PacketData::Disconnect => self.on_server_disconnect(&ns, handle),
            // v4 ERROR packets are not tied to the namespace handshake
            PacketData::ConnectError(data) if self.config.protocol == ProtocolVersion::V4 => {
                if let Some(socket) = self.sockets.get(&ns) {
                    tracing::debug!(%ns, ?data, "namespace error");
                    socket.emitter.emit("error", &EventArgs::new([data]));
                }
            }
            inner => {
                if let Some(socket) = self.sockets.get_mut(&ns) {
                    socket.on_packet(inner, handle);
                }
            }
        }
    }

    fn on_socket_connect(&mut self, ns: &Str, data: Option<Value>, handle: &LoopHandle<Self>) {
        let id = match self.config.protocol {
            ProtocolVersion::V5 => data
                .as_ref()
                .and_then(|d| d.get("sid"))
                .and_then(Value::as_str)
                .map(|sid| Str::from(sid.to_owned())),
            ProtocolVersion::V4 => self.engine_sid.as_ref().map(|sid| {
                if ns == ROOT_NS {
                    sid.clone()
                } else {
                    Str::from(format!("{ns}#{sid}"))
                }
            }),
        };
        let Some(socket) = self.sockets.get_mut(ns) else {
            return;
        };
        if !socket.open_requested {
            tracing::debug!(%ns, "ignoring connect for a socket not connecting");
            return;
        }
        let pending = socket.on_connect(id, handle);
        for packet in pending {
            self.write(packet);
        }
    }

    fn on_server_disconnect(&mut self, ns: &Str, handle: &LoopHandle<Self>) {
        let Some(mut socket) = self.sockets.remove(ns) else {
            return;
        };
        tracing::debug!(%ns, "server disconnected namespace");
        self.shared.forget_socket(ns, &socket.shared);
        socket.destroy(Some(DisconnectReason::IoServerDisconnect));
        if self.sockets.is_empty() && self.shared.release() {
            self.destroy(DisconnectReason::IoServerDisconnect, handle);
        }
    }

    /// Send the namespace CONNECT packet if the transport is open.
    /// Under protocol v4 the root namespace is connected by the server on its own.
    fn send_connect(&mut self, ns: &Str, handle: &LoopHandle<Self>) {
        let Some(socket) = self.sockets.get(ns) else {
            return;
        };
        let packet = match self.config.protocol {
            ProtocolVersion::V4 if ns == ROOT_NS => {
                if self.root_connected {
                    self.on_socket_connect(ns, None, handle);
                }
                return;
            }
            ProtocolVersion::V4 => match &socket.query {
                Some(query) => Packet::connect(format!("{ns}?{query}"), None),
                None => Packet::connect(ns.clone(), None),
            },
            ProtocolVersion::V5 => {
                let auth = socket.auth.clone().or_else(|| self.config.auth.clone());
                Packet::connect(ns.clone(), auth)
            }
        };
        self.write(packet);
    }

    pub(crate) fn connect_socket(&mut self, ns: &Str, handle: &LoopHandle<Self>) {
        let Some(socket) = self.sockets.get_mut(ns) else {
            return;
        };
        if socket.connected || (socket.open_requested && self.state != ConnectionState::Closed) {
            return;
        }
        socket.open_requested = true;
        match self.state {
            ConnectionState::Open => self.send_connect(ns, handle),
            ConnectionState::Closed => self.open(handle),
            ConnectionState::Opening | ConnectionState::Reconnecting => (),
        }
        if let Some(socket) = self.sockets.get(ns) {
            socket.emitter.emit("connecting", &EventArgs::default());
        }
    }

    pub(crate) fn close_socket(
        &mut self,
        ns: &Str,
        shared: &Arc<SocketShared>,
        handle: &LoopHandle<Self>,
    ) {
        if !self
            .sockets
            .get(ns)
            .is_some_and(|s| Arc::ptr_eq(&s.shared, shared))
        {
            return;
        }
        let Some(mut socket) = self.sockets.remove(ns) else {
            return;
        };
        let connected = socket.connected;
        if connected {
            self.write(Packet::disconnect(ns.clone()));
        }
        socket.destroy(connected.then_some(DisconnectReason::IoClientDisconnect));
        if self.sockets.is_empty() && self.shared.release() {
            self.destroy(DisconnectReason::IoClientDisconnect, handle);
        }
    }

    pub(crate) fn emit_packet(&mut self, ns: &Str, mut packet: Packet, ack: Option<AckCallback>) {
        let Some(socket) = self.sockets.get_mut(ns) else {
            tracing::debug!(%ns, "dropping packet of a closed socket");
            return;
        };
        if let Some(callback) = ack {
            socket.register_ack(&mut packet, callback);
        }
        if socket.connected {
            self.write(packet);
        } else {
            socket.buffer(packet);
        }
    }

    pub(crate) fn send_ack(&mut self, packet: Packet) {
        let connected = self.sockets.get(&packet.ns).is_some_and(|s| s.connected);
        if connected {
            self.write(packet);
        } else {
            tracing::debug!(ns = %packet.ns, "dropping ack, namespace not connected");
        }
    }

    /// Write a packet to the transport: its text frame then its attachments.
    fn write(&mut self, packet: Packet) {
        let Some(conn) = &self.conn else {
            tracing::debug!(ns = %packet.ns, "dropping packet, transport closed");
            return;
        };
        let EncodedPacket { data, attachments } = self.parser.encode(packet);
        if conn.tx.send(Message::Text(data)).is_err() {
            tracing::debug!("transport closed while writing");
            return;
        }
        for bin in attachments {
            conn.tx.send(Message::Binary(bin)).ok();
        }
    }
}

/// Forward the frames of a transport to the manager loop, then report its end.
async fn read_frames(
    generation: u64,
    mut rx: mpsc::UnboundedReceiver<Result<Message, TransportError>>,
    handle: LoopHandle<ManagerState>,
) {
    let mut reason = DisconnectReason::TransportClose;
    while let Some(msg) = rx.recv().await {
        match msg {
            Ok(msg) => {
                if !handle.submit(move |state, handle| state.on_message(generation, msg, handle)) {
                    return;
                }
            }
            Err(err) => {
                reason = match err {
                    TransportError::HeartbeatTimeout => DisconnectReason::PingTimeout,
                    _ => DisconnectReason::TransportError,
                };
                handle.submit(move |state, _| state.on_transport_error(generation, err));
            }
        }
    }
    handle.submit(move |state, handle| state.on_transport_close(generation, reason, handle));
}

/// A handle to the transport shared by the sockets of one endpoint.
///
/// It is cheaply clonable. Managers are usually obtained through an [`IoClient`](crate::IoClient)
/// which reuses one manager per endpoint.
#[derive(Clone)]
pub struct Manager {
    shared: Arc<ManagerShared>,
    handle: LoopHandle<ManagerState>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("state", &self.state())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Manager {
    /// Create a manager for `endpoint` (such as `http://localhost:3000`) with the websocket
    /// transport.
    /// The transport is opened when the first socket connects.
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn new(endpoint: &str, config: ClientConfig) -> Result<Self, Error> {
        Self::with_connector(endpoint, config, WsConnector::default())
    }

    /// Create a manager with a custom [`Connector`].
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn with_connector(
        endpoint: &str,
        config: ClientConfig,
        connector: impl Connector,
    ) -> Result<Self, Error> {
        Self::with_shared_connector(endpoint, config, Arc::new(connector))
    }

    pub(crate) fn with_shared_connector(
        endpoint: &str,
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, Error> {
        let request = ConnectRequest::new(
            endpoint,
            &config.path,
            config.protocol.engineio(),
            config.query.as_deref(),
            config.headers.clone(),
        )?;
        let config = Arc::new(config);
        let shared = Arc::new(ManagerShared {
            state: AtomicU8::new(ConnectionState::Closed as u8),
            emitter: Emitter::new(),
            sockets: Mutex::new(HashMap::new()),
            connections: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            config: config.clone(),
        });
        let backoff = Backoff::new(
            config.reconnection_delay,
            config.reconnection_delay_max,
            config.randomization_factor,
        );
        let state = ManagerState {
            config,
            request,
            connector,
            shared: shared.clone(),
            state: ConnectionState::Closed,
            conn: None,
            generation: 0,
            engine_sid: None,
            parser: CommonParser,
            parser_state: ParserState::default(),
            root_connected: false,
            sockets: HashMap::new(),
            backoff,
            reconnecting: false,
            skip_reconnect: false,
            destroyed: false,
            open_task: None,
            reconnect_task: None,
        };
        let handle = EventLoop::spawn(state);
        Ok(Self { shared, handle })
    }

    pub(crate) fn handle(&self) -> &LoopHandle<ManagerState> {
        &self.handle
    }

    /// The config shared by the sockets of this manager
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Get the socket of a namespace, creating it if needed.
    /// Requesting the same namespace twice returns the same socket as long as it is not closed.
    ///
    /// If [`ClientConfig::auto_connect`] is set, the socket is connected right away.
    pub fn socket(&self, ns: &str) -> Socket {
        self.socket_with(ns, None, None)
    }

    /// Get the socket of a namespace, with an auth payload sent in its CONNECT packet
    /// (protocol v5 only).
    pub fn socket_with_auth(&self, ns: &str, auth: Value) -> Socket {
        self.socket_with(ns, Some(auth), None)
    }

    pub(crate) fn socket_with(
        &self,
        ns: &str,
        auth: Option<Value>,
        query: Option<String>,
    ) -> Socket {
        self.try_socket_with(ns, auth, query).unwrap_or_else(|| {
            let ns = normalize_ns(ns);
            Socket::new(ns, self.clone(), Emitter::new(), Arc::new(SocketShared::closed()))
        })
    }

    /// Same as [`Manager::socket_with`] but returns `None` if the manager is destroyed.
    pub(crate) fn try_socket_with(
        &self,
        ns: &str,
        auth: Option<Value>,
        query: Option<String>,
    ) -> Option<Socket> {
        let ns = normalize_ns(ns);
        let mut sockets = self.shared.sockets();
        if let Some((emitter, shared)) = sockets.get(&ns) {
            return Some(Socket::new(ns, self.clone(), emitter.clone(), shared.clone()));
        }
        if self.is_destroyed() {
            return None;
        }

        let emitter = Emitter::new();
        let shared = Arc::new(SocketShared::default());
        sockets.insert(ns.clone(), (emitter.clone(), shared.clone()));
        drop(sockets);

        let state = SocketState::new(ns.clone(), emitter.clone(), shared.clone(), auth, query);
        self.handle.submit(move |manager, _| manager.add_socket(state));
        let socket = Socket::new(ns, self.clone(), emitter, shared);
        if self.shared.config.auto_connect {
            socket.connect();
        }
        Some(socket)
    }

    pub(crate) fn forget_socket(&self, ns: &str, shared: &Arc<SocketShared>) {
        self.shared.forget_socket(ns, shared);
    }

    /// Open the transport. It has no effect if it is not closed.
    pub fn open(&self) {
        self.handle.submit(|state, handle| state.open(handle));
    }

    /// Close the transport and cancel any pending reconnection. Sockets are kept and
    /// reconnected when one of them connects again.
    pub fn close(&self) {
        self.handle
            .submit(|state, _| state.close(DisconnectReason::ForcedClose));
    }

    /// Close the transport and every socket. The manager can't be used afterwards.
    pub fn destroy(&self) {
        self.handle
            .submit(|state, handle| state.destroy(DisconnectReason::ForcedClose, handle));
    }

    /// Cancel the manager: `error` is emitted to every socket then the manager is destroyed.
    pub(crate) fn cancel(&self) {
        self.handle.submit(|state, handle| state.cancel(handle));
    }

    /// A token cancelled once the manager is destroyed.
    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }

    /// The state of the transport connection
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    /// The number of transports opened by this manager since its creation
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Check if the manager was destroyed
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    /// Register a listener for a manager event: `open`, `close`, `error`, `connect_error`,
    /// `connect_timeout`, `reconnect`, `reconnect_attempt`, `reconnecting`, `reconnect_error` or `reconnect_failed`.
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&EventArgs) + Send + Sync + 'static,
    {
        self.shared.emitter.on(event, listener)
    }

    /// Register a listener removed after its first call.
    pub fn once<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&EventArgs) + Send + Sync + 'static,
    {
        self.shared.emitter.once(event, listener)
    }

    /// Remove a listener.
    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.emitter.off(id)
    }
}

fn normalize_ns(ns: &str) -> Str {
    match ns {
        "" | ROOT_NS => Str::from(ROOT_NS),
        ns if ns.starts_with('/') => Str::from(ns.to_owned()),
        ns => Str::from(format!("/{ns}")),
    }
}
