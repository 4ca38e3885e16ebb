//! Socket.io packet implementation.
//! The [`Packet`] is the base unit of data that is exchanged with the server over the engine.io
//! connection.

use bytes::Bytes;
use serde_json::Value;

use crate::Str;

/// The root namespace. Packets without a namespace segment belong to it.
pub const ROOT_NS: &str = "/";

/// The socket.io packet type.
/// Each packet has a type and a namespace
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// The packet data
    pub inner: PacketData,
    /// The namespace the packet belongs to
    pub ns: Str,
}

impl Packet {
    /// Create a connect packet for the given namespace with an optional auth payload (v5 only)
    pub fn connect(ns: impl Into<Str>, auth: Option<Value>) -> Self {
        Self {
            inner: PacketData::Connect(auth),
            ns: ns.into(),
        }
    }

    /// Create a disconnect packet for the given namespace
    pub fn disconnect(ns: impl Into<Str>) -> Self {
        Self {
            inner: PacketData::Disconnect,
            ns: ns.into(),
        }
    }

    /// Create a connect error packet for the given namespace
    pub fn connect_error(ns: impl Into<Str>, data: Value) -> Self {
        Self {
            inner: PacketData::ConnectError(data),
            ns: ns.into(),
        }
    }

    /// Create an event packet for the given namespace.
    /// If the payload carries binary attachments, it will be a binary packet.
    pub fn event(ns: impl Into<Str>, data: Payload, ack: Option<u64>) -> Self {
        Self {
            inner: if data.has_attachments() {
                PacketData::BinaryEvent(data, ack)
            } else {
                PacketData::Event(data, ack)
            },
            ns: ns.into(),
        }
    }

    /// Create an ack packet for the given namespace.
    /// If the payload carries binary attachments, it will be a binary packet.
    pub fn ack(ns: impl Into<Str>, data: Payload, ack: u64) -> Self {
        Self {
            inner: if data.has_attachments() {
                PacketData::BinaryAck(data, ack)
            } else {
                PacketData::EventAck(data, ack)
            },
            ns: ns.into(),
        }
    }
}

/// | Type          | ID  | Usage                                                          |
/// |---------------|-----|----------------------------------------------------------------|
/// | CONNECT       | 0   | Used during the connection to a namespace.                     |
/// | DISCONNECT    | 1   | Used when disconnecting from a namespace.                      |
/// | EVENT         | 2   | Used to send data to the other side.                           |
/// | ACK           | 3   | Used to acknowledge an event.                                  |
/// | ERROR         | 4   | Used when the connection to a namespace is refused.            |
/// | BINARY_EVENT  | 5   | Used to send binary data to the other side.                    |
/// | BINARY_ACK    | 6   | Used to acknowledge an event (the response includes binary).   |
#[derive(Debug, Clone, PartialEq)]
pub enum PacketData {
    /// Connect packet with an optional payload (auth when sent, handshake data when received)
    Connect(Option<Value>),
    /// Disconnect packet, used to disconnect from a namespace
    Disconnect,
    /// Event packet with optional ack id, to request an ack from the other side
    Event(Payload, Option<u64>),
    /// Event ack packet, to acknowledge an event
    EventAck(Payload, u64),
    /// Error packet, sent by the server when a namespace connection is refused
    ConnectError(Value),
    /// Binary event packet with optional ack id, to request an ack from the other side
    BinaryEvent(Payload, Option<u64>),
    /// Binary ack packet, to acknowledge an event with binary data
    BinaryAck(Payload, u64),
}

impl PacketData {
    /// Returns the index of the packet type
    pub fn index(&self) -> usize {
        match self {
            PacketData::Connect(_) => 0,
            PacketData::Disconnect => 1,
            PacketData::Event(_, _) => 2,
            PacketData::EventAck(_, _) => 3,
            PacketData::ConnectError(_) => 4,
            PacketData::BinaryEvent(_, _) => 5,
            PacketData::BinaryAck(_, _) => 6,
        }
    }

    /// Set the ack id for the packet
    /// It will only set the ack id for the packets that support it
    pub fn set_ack_id(&mut self, ack_id: u64) {
        match self {
            PacketData::Event(_, ack) | PacketData::BinaryEvent(_, ack) => *ack = Some(ack_id),
            PacketData::EventAck(_, ack) | PacketData::BinaryAck(_, ack) => *ack = ack_id,
            _ => {}
        };
    }

    /// Get the ack id of the packet if there is one
    pub fn ack_id(&self) -> Option<u64> {
        match self {
            PacketData::Event(_, ack) | PacketData::BinaryEvent(_, ack) => *ack,
            PacketData::EventAck(_, ack) | PacketData::BinaryAck(_, ack) => Some(*ack),
            _ => None,
        }
    }

    /// Check if the packet is a binary packet (either binary event or binary ack)
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            PacketData::BinaryEvent(_, _) | PacketData::BinaryAck(_, _)
        )
    }

    /// Get the payload of event and ack packets
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            PacketData::Event(p, _)
            | PacketData::BinaryEvent(p, _)
            | PacketData::EventAck(p, _)
            | PacketData::BinaryAck(p, _) => Some(p),
            _ => None,
        }
    }
}

/// The ordered sequence of values carried by event and ack packets.
///
/// For events the first argument is the event name. Binary attachments are referenced in `args`
/// through placeholders (see [`Payload::placeholder`]) and stored in `attachments`, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    /// The json arguments
    pub args: Vec<Value>,
    /// The binary attachments referenced by placeholders in `args`
    pub attachments: Vec<Bytes>,
}

impl Payload {
    /// Create a payload without binary attachments
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            attachments: Vec::new(),
        }
    }

    /// Create a payload with binary attachments
    pub fn with_attachments(args: Vec<Value>, attachments: Vec<Bytes>) -> Self {
        Self { args, attachments }
    }

    /// Build an event payload: `[event, ...args]`
    pub fn event(event: &str, args: impl IntoIterator<Item = Value>) -> Self {
        let mut data = vec![Value::String(event.to_owned())];
        data.extend(args);
        Self::new(data)
    }

    /// The placeholder marking the position of the `num`th binary attachment in the args.
    pub fn placeholder(num: usize) -> Value {
        serde_json::json!({ "_placeholder": true, "num": num })
    }

    /// If the value is a binary placeholder, return the attachment index it refers to.
    pub fn placeholder_index(value: &Value) -> Option<usize> {
        let obj = value.as_object()?;
        if obj.get("_placeholder")?.as_bool()? {
            obj.get("num")?.as_u64().map(|n| n as usize)
        } else {
            None
        }
    }

    /// Resolve a placeholder argument to its attachment.
    pub fn attachment_for(&self, value: &Value) -> Option<&Bytes> {
        Self::placeholder_index(value).and_then(|i| self.attachments.get(i))
    }

    /// Check if the payload carries binary attachments
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Split an event payload into its name and its arguments.
    /// Returns `None` if the first argument is missing or is not a string.
    pub fn into_event(mut self) -> Option<(String, Payload)> {
        if self.args.is_empty() {
            return None;
        }
        match self.args.remove(0) {
            Value::String(event) => Some((event, self)),
            _ => None,
        }
    }
}
