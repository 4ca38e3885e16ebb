use std::collections::VecDeque;

use serde_json::Value;
use sioclient_core::{
    Str,
    packet::{Packet, PacketData, ROOT_NS},
    parser::EncodedPacket,
};

/// Serialize a packet into its text frame and its attachments:
/// `<type>[<attachments>-][<namespace>,][<ack id>][<json payload>]`
pub fn serialize_packet(packet: Packet) -> EncodedPacket {
    let mut buffer = String::with_capacity(get_size_hint(&packet));
    buffer.push(char::from(b'0' + packet.inner.index() as u8));
    let is_binary = packet.inner.is_binary();

    let attachments = match packet.inner {
        PacketData::Connect(data) => {
            serialize_nsp(&mut buffer, &packet.ns);
            if let Some(data) = data {
                serialize_json(&mut buffer, &data);
            }
            VecDeque::new()
        }
        PacketData::Disconnect => {
            serialize_nsp(&mut buffer, &packet.ns);
            VecDeque::new()
        }
        PacketData::ConnectError(data) => {
            serialize_nsp(&mut buffer, &packet.ns);
            if !data.is_null() {
                serialize_json(&mut buffer, &data);
            }
            VecDeque::new()
        }
        PacketData::Event(data, ack) | PacketData::BinaryEvent(data, ack) => {
            if is_binary {
                serialize_attachments(&mut buffer, data.attachments.len());
            }
            serialize_nsp(&mut buffer, &packet.ns);
            serialize_ack(&mut buffer, ack);
            serialize_args(&mut buffer, &data.args);
            data.attachments.into()
        }
        PacketData::EventAck(data, ack) | PacketData::BinaryAck(data, ack) => {
            if is_binary {
                serialize_attachments(&mut buffer, data.attachments.len());
            }
            serialize_nsp(&mut buffer, &packet.ns);
            serialize_ack(&mut buffer, Some(ack));
            serialize_args(&mut buffer, &data.args);
            data.attachments.into()
        }
    };

    EncodedPacket {
        data: Str::from(buffer),
        attachments,
    }
}

fn serialize_attachments(buffer: &mut String, attachments: usize) {
    let mut itoa_buf = itoa::Buffer::new();
    buffer.push_str(itoa_buf.format(attachments));
    buffer.push('-');
}

fn serialize_nsp(buffer: &mut String, nsp: &str) {
    if !nsp.is_empty() && nsp != ROOT_NS {
        if !nsp.starts_with('/') {
            buffer.push('/');
        }
        buffer.push_str(nsp);
        buffer.push(',');
    }
}

fn serialize_ack(buffer: &mut String, ack: Option<u64>) {
    if let Some(ack) = ack {
        let mut itoa_buf = itoa::Buffer::new();
        buffer.push_str(itoa_buf.format(ack));
    }
}

fn serialize_args(buffer: &mut String, args: &[Value]) {
    // A `Value` always serializes: map keys are strings and io is in memory.
    if let Ok(data) = serde_json::to_string(args) {
        buffer.push_str(&data);
    }
}

fn serialize_json(buffer: &mut String, data: &Value) {
    if let Ok(data) = serde_json::to_string(data) {
        buffer.push_str(&data);
    }
}

/// Rough size of the serialized packet, used to pre-allocate the buffer.
fn get_size_hint(packet: &Packet) -> usize {
    const PACKET_INDEX_SIZE: usize = 1;
    const BINARY_PUNCTUATION_SIZE: usize = 2;
    const NS_PUNCTUATION_SIZE: usize = 2;
    const MAX_ACK_SIZE: usize = 20;

    let nsp_size = if packet.ns == ROOT_NS {
        0
    } else {
        packet.ns.len() + NS_PUNCTUATION_SIZE
    };
    let data_size = match packet.inner.payload() {
        // Args are mostly small scalars or objects, this is only a hint.
        Some(p) => {
            p.args.len() * 8
                + MAX_ACK_SIZE
                + if p.has_attachments() {
                    BINARY_PUNCTUATION_SIZE + 4
                } else {
                    0
                }
        }
        None => 16,
    };
    PACKET_INDEX_SIZE + nsp_size + data_size
}
