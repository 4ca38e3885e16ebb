use serde_json::Value;
use sioclient_core::{
    Str,
    packet::{Packet, PacketData, Payload, ROOT_NS},
    parser::ParseError,
};

/// Deserialize a text frame into a packet.
/// It also returns the number of attachments announced by binary packets.
pub fn deserialize_packet(data: Str) -> Result<(Packet, Option<usize>), ParseError> {
    let bytes = data.as_bytes();
    let index = *bytes.first().ok_or(ParseError::InvalidPacketType)?;
    if !(b'0'..=b'6').contains(&index) {
        return Err(ParseError::InvalidPacketType);
    }
    // Separators are all ascii so byte positions always fall on char boundaries.
    let mut pos = 1;

    let attachments = if index == b'5' || index == b'6' {
        Some(read_attachments(bytes, &mut pos).ok_or(ParseError::InvalidAttachments)?)
    } else {
        None
    };

    // Custom nsps start with a slash
    let ns = if bytes.get(pos) == Some(&b'/') {
        read_nsp(&data, &mut pos)?
    } else {
        Str::from(ROOT_NS)
    };

    let ack = read_ack(bytes, &mut pos)?;
    let data = data.slice(pos..);

    let inner = match index {
        b'0' => PacketData::Connect(read_json(&data)?),
        b'1' => PacketData::Disconnect,
        b'2' => PacketData::Event(read_payload(&data)?, ack),
        b'3' => PacketData::EventAck(read_payload(&data)?, ack.ok_or(ParseError::InvalidAckId)?),
        b'4' => PacketData::ConnectError(read_json(&data)?.unwrap_or(Value::Null)),
        b'5' => PacketData::BinaryEvent(read_payload(&data)?, ack),
        b'6' => PacketData::BinaryAck(read_payload(&data)?, ack.ok_or(ParseError::InvalidAckId)?),
        _ => return Err(ParseError::InvalidPacketType),
    };
    Ok((Packet { inner, ns }, attachments))
}

/// Read the `<n>-` attachment header
fn read_attachments(bytes: &[u8], pos: &mut usize) -> Option<usize> {
    let start = *pos;
    let end = start + bytes[start..].iter().position(|c| !c.is_ascii_digit())?;
    if end == start || bytes[end] != b'-' {
        return None;
    }
    *pos = end + 1;
    std::str::from_utf8(&bytes[start..end]).ok()?.parse().ok()
}

/// Read the namespace up to the next `,` (or the end of the frame).
/// A v4 connect query (`/nsp?key=value`) is stripped.
fn read_nsp(data: &Str, pos: &mut usize) -> Result<Str, ParseError> {
    let bytes = data.as_bytes();
    let start = *pos;
    let end = bytes[start..]
        .iter()
        .position(|c| *c == b',')
        .map_or(bytes.len(), |i| start + i);
    *pos = (end + 1).min(bytes.len());

    let nsp = data.slice(start..end);
    let nsp = match nsp.find('?') {
        Some(i) => nsp.slice(..i),
        None => nsp,
    };
    if nsp.is_empty() || nsp.contains(char::is_whitespace) {
        return Err(ParseError::InvalidNamespace);
    }
    Ok(nsp)
}

fn read_ack(bytes: &[u8], pos: &mut usize) -> Result<Option<u64>, ParseError> {
    let start = *pos;
    let len = bytes[start..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if len == 0 {
        return Ok(None);
    }
    *pos = start + len;
    std::str::from_utf8(&bytes[start..start + len])
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Some)
        .ok_or(ParseError::InvalidAckId)
}

fn read_json(data: &str) -> Result<Option<Value>, ParseError> {
    if data.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::from_str(data)?))
    }
}

fn read_payload(data: &str) -> Result<Payload, ParseError> {
    match read_json(data)? {
        Some(Value::Array(args)) => Ok(Payload::new(args)),
        _ => Err(ParseError::InvalidPayload),
    }
}
