//! A [`Socket`] is a logical channel scoped to one namespace.
//!
//! Every socket of a [`Manager`] shares its transport. The state of a socket lives in the
//! manager event loop (see [`SocketState`]), the [`Socket`] handle only submits tasks to it.
//!
//! #### Example
//! ```no_run
//! # use serde_json::json;
//! # use sioclient::{IoClient, SocketOptions};
//! # async fn doc() -> Result<(), sioclient::Error> {
//! let client = IoClient::new();
//! let socket = client.socket(SocketOptions::new("http://localhost:3000").namespace("/chat"))?;
//! socket.on("message", |args| println!("received {:?}", args.args));
//! // Buffered until the namespace is connected
//! socket.emit("hello", [json!("world")]).ok();
//! # Ok(())
//! # }
//! ```
use std::{
    collections::{HashMap, VecDeque},
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;
use futures_core::Stream;
use serde_json::Value;
use sioclient_core::{
    Str,
    packet::{Packet, PacketData, Payload},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    ack::{AckCallback, AckFuture, AckSender},
    emitter::{EventArgs, ListenerId, WILDCARD},
    errors::{Error, SendError},
    event_loop::LoopHandle,
    manager::{Manager, ManagerState},
};

/// Event names reserved for lifecycle events. They cannot be emitted.
pub const RESERVED_EVENTS: [&str; 11] = [
    "connect",
    "connect_error",
    "connect_timeout",
    "connecting",
    "disconnect",
    "error",
    "reconnect",
    "reconnect_attempt",
    "reconnect_failed",
    "reconnect_error",
    "reconnecting",
];

/// The reason of a `disconnect` or `close` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The transport was closed by the server or the network
    TransportClose,
    /// The transport failed
    TransportError,
    /// The server stopped answering the heartbeat
    PingTimeout,
    /// The socket was closed with [`Socket::close`]
    IoClientDisconnect,
    /// The server disconnected the namespace
    IoServerDisconnect,
    /// The manager was closed, destroyed or cancelled
    ForcedClose,
}

impl DisconnectReason {
    /// The name of the reason, as sent to the `disconnect` listeners
    pub fn as_str(self) -> &'static str {
        match self {
            DisconnectReason::TransportClose => "transport close",
            DisconnectReason::TransportError => "transport error",
            DisconnectReason::PingTimeout => "ping timeout",
            DisconnectReason::IoClientDisconnect => "io client disconnect",
            DisconnectReason::IoServerDisconnect => "io server disconnect",
            DisconnectReason::ForcedClose => "forced close",
        }
    }

    pub(crate) fn args(self) -> EventArgs {
        EventArgs::new([Value::String(self.as_str().to_owned())])
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of the socket state readable outside of the event loop.
#[derive(Debug, Default)]
pub(crate) struct SocketShared {
    connected: AtomicBool,
    closed: AtomicBool,
    id: RwLock<Option<Str>>,
}

impl SocketShared {
    pub fn closed() -> Self {
        let shared = Self::default();
        shared.closed.store(true, Ordering::SeqCst);
        shared
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark the socket as closed. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    fn set_connected(&self, id: Option<Str>) {
        self.connected.store(id.is_some(), Ordering::SeqCst);
        *self.id.write().unwrap_or_else(|e| e.into_inner()) = id;
    }
}

/// The state of a socket, owned by the manager event loop.
pub(crate) struct SocketState {
    pub ns: Str,
    pub emitter: crate::Emitter,
    pub shared: Arc<SocketShared>,
    pub auth: Option<Value>,
    pub query: Option<String>,
    pub connected: bool,
    /// Set once [`Socket::connect`] was called: the namespace is connected on each transport open.
    pub open_requested: bool,
    ack_counter: u64,
    acks: HashMap<u64, AckCallback>,
    send_buffer: VecDeque<Packet>,
    receive_buffer: VecDeque<(Payload, Option<u64>)>,
}

impl SocketState {
    pub fn new(
        ns: Str,
        emitter: crate::Emitter,
        shared: Arc<SocketShared>,
        auth: Option<Value>,
        query: Option<String>,
    ) -> Self {
        Self {
            ns,
            emitter,
            shared,
            auth,
            query,
            connected: false,
            open_requested: false,
            ack_counter: 0,
            acks: HashMap::new(),
            send_buffer: VecDeque::new(),
            receive_buffer: VecDeque::new(),
        }
    }

    /// Register the ack callback of an outgoing event and set its ack id.
    /// Ids are allocated from 0 and never reused.
    pub fn register_ack(&mut self, packet: &mut Packet, callback: AckCallback) {
        let id = self.ack_counter;
        self.ack_counter += 1;
        packet.inner.set_ack_id(id);
        self.acks.insert(id, callback);
    }

    /// Keep a packet until the namespace is connected.
    pub fn buffer(&mut self, packet: Packet) {
        tracing::trace!(ns = %self.ns, "buffering packet until connected");
        self.send_buffer.push_back(packet);
    }

    /// Complete the namespace handshake: emit `connect`, replay the received events and
    /// return the buffered packets to send, in emit order.
    pub fn on_connect(
        &mut self,
        id: Option<Str>,
        handle: &LoopHandle<ManagerState>,
    ) -> VecDeque<Packet> {
        tracing::debug!(ns = %self.ns, ?id, "namespace connected");
        self.connected = true;
        self.shared.set_connected(Some(id.unwrap_or_default()));
        self.emitter.emit("connect", &EventArgs::default());

        while let Some((payload, ack)) = self.receive_buffer.pop_front() {
            self.dispatch(payload, ack, handle);
        }
        std::mem::take(&mut self.send_buffer)
    }

    /// The transport was closed. Pending acks and buffers are kept for the next connection.
    pub fn on_close(&mut self, reason: DisconnectReason) {
        tracing::debug!(ns = %self.ns, %reason, "namespace disconnected");
        self.connected = false;
        self.shared.set_connected(None);
        self.emitter.emit("disconnect", &reason.args());
    }

    /// Handle an event, ack or connect error packet of this namespace.
    pub fn on_packet(&mut self, packet: PacketData, handle: &LoopHandle<ManagerState>) {
        match packet {
            PacketData::Event(payload, ack) | PacketData::BinaryEvent(payload, ack) => {
                if self.connected {
                    self.dispatch(payload, ack, handle);
                } else {
                    self.receive_buffer.push_back((payload, ack));
                }
            }
            PacketData::EventAck(payload, ack_id) | PacketData::BinaryAck(payload, ack_id) => {
                match self.acks.remove(&ack_id) {
                    Some(callback) => {
                        tracing::trace!(ns = %self.ns, ack_id, "calling ack callback");
                        if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                            tracing::error!(ns = %self.ns, ack_id, "ack callback panicked");
                        }
                    }
                    None => {
                        let err = Error::StaleAck {
                            ns: self.ns.clone(),
                            ack_id,
                        };
                        tracing::debug!(%err, "dropping ack");
                    }
                }
            }
            PacketData::ConnectError(data) => {
                tracing::debug!(ns = %self.ns, ?data, "namespace connection refused");
                self.emitter.emit("connect_error", &EventArgs::new([data]));
            }
            PacketData::Connect(_) | PacketData::Disconnect => {}
        }
    }

    fn dispatch(&self, payload: Payload, ack: Option<u64>, handle: &LoopHandle<ManagerState>) {
        let Some((event, payload)) = payload.into_event() else {
            tracing::warn!(ns = %self.ns, "dropping event without name");
            return;
        };
        let args = EventArgs {
            args: payload.args,
            binary: payload.attachments,
            ack: ack.map(|id| AckSender::new(id, self.ns.clone(), handle.clone())),
        };
        self.emitter.emit(&event, &args);
        self.emitter.emit(WILDCARD, &args.with_event_name(&event));
    }

    /// Terminal state: pending acks and buffers are dropped without being called,
    /// listeners are removed after the optional `disconnect` event.
    pub fn destroy(&mut self, reason: Option<DisconnectReason>) {
        tracing::debug!(ns = %self.ns, ?reason, "destroying socket");
        self.connected = false;
        self.shared.close();
        self.shared.set_connected(None);
        self.acks.clear();
        self.send_buffer.clear();
        self.receive_buffer.clear();
        if let Some(reason) = reason {
            self.emitter.emit("disconnect", &reason.args());
        }
        self.emitter.off_all(None);
    }
}

/// A namespace scoped channel over the transport of a [`Manager`].
///
/// It is cheaply clonable, every clone refers to the same channel.
#[derive(Clone)]
pub struct Socket {
    ns: Str,
    manager: Manager,
    emitter: crate::Emitter,
    shared: Arc<SocketShared>,
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("ns", &self.ns)
            .field("connected", &self.connected())
            .field("closed", &self.shared.is_closed())
            .finish()
    }
}

impl Socket {
    pub(crate) fn new(
        ns: Str,
        manager: Manager,
        emitter: crate::Emitter,
        shared: Arc<SocketShared>,
    ) -> Self {
        Self {
            ns,
            manager,
            emitter,
            shared,
        }
    }

    /// Connect the namespace, opening the manager if needed. It emits `connecting`.
    /// It has no effect if the socket is connected, connecting or closed.
    pub fn connect(&self) {
        if self.shared.is_closed() {
            return;
        }
        let ns = self.ns.clone();
        self.manager
            .handle()
            .submit(move |state, handle| state.connect_socket(&ns, handle));
    }

    /// Alias of [`Socket::connect`].
    #[inline]
    pub fn open(&self) {
        self.connect();
    }

    /// Emit an event to the server.
    ///
    /// It is sent right away if the namespace is connected, otherwise it is buffered and sent
    /// once connected, in emit order.
    pub fn emit(
        &self,
        event: impl AsRef<str>,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<(), SendError> {
        let payload = Payload::event(event.as_ref(), args);
        self.emit_payload(event.as_ref(), payload, None)
    }

    /// Emit an event with binary attachments. Attachments are referenced in `args` with
    /// [`Payload::placeholder`].
    pub fn emit_with_binary(
        &self,
        event: impl AsRef<str>,
        args: impl IntoIterator<Item = Value>,
        binary: Vec<Bytes>,
    ) -> Result<(), SendError> {
        let mut payload = Payload::event(event.as_ref(), args);
        payload.attachments = binary;
        self.emit_payload(event.as_ref(), payload, None)
    }

    /// Emit an event and call `callback` with the acknowledgement of the server.
    ///
    /// The callback is called at most once. It is dropped without being called if the socket is
    /// closed first.
    pub fn emit_with_ack<F>(
        &self,
        event: impl AsRef<str>,
        args: impl IntoIterator<Item = Value>,
        callback: F,
    ) -> Result<(), SendError>
    where
        F: FnOnce(Payload) + Send + 'static,
    {
        let payload = Payload::event(event.as_ref(), args);
        self.emit_payload(event.as_ref(), payload, Some(Box::new(callback)))
    }

    /// Emit an event and return a future of the acknowledgement of the server.
    ///
    /// #### Example
    /// ```no_run
    /// # use std::time::Duration;
    /// # use serde_json::json;
    /// # async fn doc(socket: sioclient::Socket) {
    /// let ack = socket.emit_ack("get", [json!("key")]).unwrap();
    /// match tokio::time::timeout(Duration::from_secs(5), ack).await {
    ///     Ok(Ok(payload)) => println!("ack: {:?}", payload.args),
    ///     Ok(Err(err)) => println!("socket closed: {err}"),
    ///     Err(_) => println!("no ack received"),
    /// }
    /// # }
    /// ```
    pub fn emit_ack(
        &self,
        event: impl AsRef<str>,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<AckFuture, SendError> {
        let (fut, callback) = AckFuture::new();
        let payload = Payload::event(event.as_ref(), args);
        self.emit_payload(event.as_ref(), payload, Some(callback))?;
        Ok(fut)
    }

    /// Emit a `message` event.
    #[inline]
    pub fn send(&self, args: impl IntoIterator<Item = Value>) -> Result<(), SendError> {
        self.emit("message", args)
    }

    fn emit_payload(
        &self,
        event: &str,
        payload: Payload,
        ack: Option<AckCallback>,
    ) -> Result<(), SendError> {
        if RESERVED_EVENTS.contains(&event) {
            return Err(SendError::ReservedEvent(event.to_owned()));
        }
        if self.shared.is_closed() {
            return Err(SendError::Closed);
        }
        let ns = self.ns.clone();
        let packet = Packet::event(ns.clone(), payload, None);
        let submitted = self
            .manager
            .handle()
            .submit(move |state, _| state.emit_packet(&ns, packet, ack));
        if submitted {
            Ok(())
        } else {
            Err(SendError::Closed)
        }
    }

    /// Close the socket. A DISCONNECT packet is sent if the namespace is connected.
    ///
    /// The socket can't be used afterwards. Closing the last socket of a manager destroys it.
    pub fn close(&self) {
        if !self.shared.close() {
            return;
        }
        self.manager.forget_socket(&self.ns, &self.shared);
        let ns = self.ns.clone();
        let shared = self.shared.clone();
        self.manager
            .handle()
            .submit(move |state, handle| state.close_socket(&ns, &shared, handle));
    }

    /// Alias of [`Socket::close`].
    #[inline]
    pub fn disconnect(&self) {
        self.close();
    }

    /// Register a listener for an application or lifecycle event.
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&EventArgs) + Send + Sync + 'static,
    {
        self.emitter.on(event, listener)
    }

    /// Register a listener removed after its first call.
    pub fn once<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&EventArgs) + Send + Sync + 'static,
    {
        self.emitter.once(event, listener)
    }

    /// Remove a listener.
    pub fn off(&self, id: ListenerId) -> bool {
        self.emitter.off(id)
    }

    /// A stream of every application event received on this namespace, as delivered to the
    /// wildcard listeners: the first argument is the event name. It ends when the socket is closed.
    pub fn event_stream(&self) -> impl Stream<Item = EventArgs> + Send + Unpin + 'static {
        let (tx, rx) = mpsc::unbounded_channel();
        self.emitter.on(WILDCARD, move |args| {
            tx.send(args.clone()).ok();
        });
        UnboundedReceiverStream::new(rx)
    }

    /// Check if the namespace is connected
    pub fn connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Check if the socket was closed
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// The id given by the server, if connected.
    pub fn id(&self) -> Option<Str> {
        self.shared
            .id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The namespace of this socket
    pub fn namespace(&self) -> &str {
        &self.ns
    }

    /// The manager of this socket
    pub fn manager(&self) -> &Manager {
        &self.manager
    }
}
