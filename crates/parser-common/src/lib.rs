#![warn(
    clippy::all,
    clippy::todo,
    clippy::empty_enum,
    clippy::mem_forget,
    clippy::unused_self,
    clippy::filter_map_next,
    clippy::needless_continue,
    clippy::needless_borrow,
    clippy::match_wildcard_for_single_variants,
    clippy::if_let_mutex,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::lossy_float_literal,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::fn_params_excessive_bools,
    clippy::exit,
    clippy::inefficient_to_string,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::option_option,
    clippy::verbose_file_reads,
    clippy::unnested_or_patterns,
    rust_2018_idioms,
    future_incompatible,
    nonstandard_style,
    missing_docs
)]

//! The common parser sub-crate for the sioclient crate.
//!
//! It is used to parse and serialize the common packet format of the socket.io protocol:
//! ```text
//! <packet type>[<# of binary attachments>-][<namespace>,][<acknowledgment id>][JSON-stringified payload without binary]
//! + binary attachments extracted
//! ```
//!
//! Binary attachments are reassembled in arrival order: the attachments that follow a binary
//! packet header belong to it, and only one binary packet can be pending at a time.
use bytes::Bytes;

use sioclient_core::{
    Str,
    packet::{Packet, PacketData},
    parser::{EncodedPacket, Parse, ParseError, ParserState},
};

mod de;
mod ser;

/// Parse and serialize from and into the socket.io common packet format.
/// See details in the [socket.io protocol doc](https://socket.io/docs/v4/socket-io-protocol/#packet-encoding).
#[derive(Debug, Default, Clone, Copy)]
pub struct CommonParser;

impl Parse for CommonParser {
    fn encode(self, packet: Packet) -> EncodedPacket {
        ser::serialize_packet(packet)
    }

    fn decode_str(self, state: &mut ParserState, value: Str) -> Result<Packet, ParseError> {
        // A new text frame supersedes a binary packet that never got all of its attachments.
        state.reset();
        let (packet, incoming_binary_cnt) = de::deserialize_packet(value)?;
        if packet.inner.is_binary() {
            let incoming_binary_cnt = incoming_binary_cnt.ok_or(ParseError::InvalidAttachments)?;
            if is_bin_packet_complete(&packet.inner, incoming_binary_cnt) {
                Ok(packet)
            } else {
                state.partial_bin_packet = Some(packet);
                state.incoming_binary_cnt = incoming_binary_cnt;
                Err(ParseError::NeedsMoreBinaryData)
            }
        } else {
            Ok(packet)
        }
    }

    fn decode_bin(self, state: &mut ParserState, data: Bytes) -> Result<Packet, ParseError> {
        match &mut state.partial_bin_packet {
            Some(Packet {
                inner: PacketData::BinaryEvent(payload, _) | PacketData::BinaryAck(payload, _),
                ..
            }) => {
                payload.attachments.push(data);
                if state.incoming_binary_cnt > payload.attachments.len() {
                    Err(ParseError::NeedsMoreBinaryData)
                } else {
                    let packet = state.partial_bin_packet.take();
                    state.reset();
                    packet.ok_or(ParseError::UnexpectedBinaryPacket)
                }
            }
            _ => Err(ParseError::UnexpectedBinaryPacket),
        }
    }
}

/// Check if the binary packet is complete, it means that all attachments have been received
fn is_bin_packet_complete(packet: &PacketData, incoming_binary_cnt: usize) -> bool {
    match &packet {
        PacketData::BinaryEvent(payload, _) | PacketData::BinaryAck(payload, _) => {
            incoming_binary_cnt == payload.attachments.len()
        }
        _ => true,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use sioclient_core::packet::Payload;

    fn encode(packet: Packet) -> String {
        CommonParser.encode(packet).data.into()
    }
    fn decode(value: String) -> Packet {
        CommonParser
            .decode_str(&mut Default::default(), value.into())
            .unwrap()
    }
    fn event(event: &str, args: serde_json::Value) -> Payload {
        Payload::event(event, [args])
    }

    #[test]
    fn packet_decode_connect() {
        let payload = format!("0{}", json!({ "sid": "abc" }));
        let packet = decode(payload);
        assert_eq!(Packet::connect("/", Some(json!({ "sid": "abc" }))), packet);

        let payload = format!("0/admin™,{}", json!({ "sid": "abc" }));
        let packet = decode(payload);
        assert_eq!(Packet::connect("/admin™", Some(json!({ "sid": "abc" }))), packet);

        assert_eq!(decode("0".into()), Packet::connect("/", None));
        assert_eq!(decode("0/admin,".into()), Packet::connect("/admin", None));
    }

    #[test]
    fn packet_encode_connect() {
        assert_eq!(encode(Packet::connect("/", None)), "0");
        assert_eq!(encode(Packet::connect("/admin™", None)), "0/admin™,");

        let payload = format!("0/admin™,{}", json!({ "token": "123" }));
        let packet = encode(Packet::connect("/admin™", Some(json!({ "token": "123" }))));
        assert_eq!(packet, payload);
    }

    #[test]
    fn packet_decode_disconnect() {
        assert_eq!(decode("1".into()), Packet::disconnect("/"));
        assert_eq!(decode("1/admin™,".into()), Packet::disconnect("/admin™"));
    }

    #[test]
    fn packet_encode_disconnect() {
        assert_eq!(encode(Packet::disconnect("/")), "1");
        assert_eq!(encode(Packet::disconnect("/admin™")), "1/admin™,");
    }

    #[test]
    fn packet_decode_event() {
        let payload = format!("2{}", json!(["event", { "data": "value" }]));
        let packet = decode(payload);
        assert_eq!(
            Packet::event("/", event("event", json!({"data": "value"})), None),
            packet
        );

        // Check with ack ID
        let payload = format!("21{}", json!(["event", { "data": "value" }]));
        let packet = decode(payload);
        assert_eq!(
            Packet::event("/", event("event", json!({"data": "value"})), Some(1)),
            packet
        );

        // Check with NS
        let payload = format!("2/admin™,{}", json!(["event", { "data": "value™" }]));
        let packet = decode(payload);
        assert_eq!(
            Packet::event("/admin™", event("event", json!({"data": "value™"})), None),
            packet
        );

        // Check with ack ID and NS
        let payload = format!("2/admin™,1{}", json!(["event", { "data": "value™" }]));
        let packet = decode(payload);
        assert_eq!(
            Packet::event("/admin™", event("event", json!({"data": "value™"})), Some(1)),
            packet
        );
    }

    #[test]
    fn packet_encode_event() {
        let payload = format!("2{}", json!(["event", { "data": "value™" }]));
        let packet = encode(Packet::event(
            "/",
            event("event", json!({ "data": "value™" })),
            None,
        ));
        assert_eq!(packet, payload);

        // Encode without args
        let packet = encode(Packet::event("/", Payload::event("event", []), None));
        assert_eq!(packet, r#"2["event"]"#);

        // Encode with ack ID
        let payload = format!("21{}", json!(["event", { "data": "value™" }]));
        let packet = encode(Packet::event(
            "/",
            event("event", json!({ "data": "value™" })),
            Some(1),
        ));
        assert_eq!(packet, payload);

        // Encode with NS and ack ID
        let payload = format!("2/admin™,1{}", json!(["event", { "data": "value™" }]));
        let packet = encode(Packet::event(
            "/admin™",
            event("event", json!({ "data": "value™" })),
            Some(1),
        ));
        assert_eq!(packet, payload);
    }

    #[test]
    fn packet_decode_event_ack() {
        let packet = decode("354[\"data\"]".into());
        assert_eq!(Packet::ack("/", Payload::new(vec![json!("data")]), 54), packet);

        let packet = decode("3/admin™,54[\"data\"]".into());
        assert_eq!(
            Packet::ack("/admin™", Payload::new(vec![json!("data")]), 54),
            packet
        );
    }

    #[test]
    fn packet_encode_event_ack() {
        let packet = encode(Packet::ack("/", Payload::new(vec![json!("data")]), 54));
        assert_eq!(packet, "354[\"data\"]");

        let packet = encode(Packet::ack("/admin™", Payload::new(vec![json!("data")]), 54));
        assert_eq!(packet, "3/admin™,54[\"data\"]");
    }

    #[test]
    fn packet_encode_binary_event() {
        let json = json!(["event", { "data": "value™" }, { "_placeholder": true, "num": 0}]);
        let payload = || {
            Payload::with_attachments(
                vec![json!("event"), json!({ "data": "value™" }), Payload::placeholder(0)],
                vec![Bytes::from_static(&[1])],
            )
        };

        let packet = CommonParser.encode(Packet::event("/", payload(), None));
        assert_eq!(packet.data, format!("51-{}", json).as_str());
        assert_eq!(packet.attachments.len(), 1);

        let packet = encode(Packet::event("/admin™", payload(), Some(254)));
        assert_eq!(packet, format!("51-/admin™,254{}", json));
    }

    #[test]
    fn packet_decode_binary_event() {
        let json = json!(["event", { "data": "value™" }, { "_placeholder": true, "num": 0}, { "_placeholder": true, "num": 1}]);
        let comparison_packet = |ack, ns: &'static str| Packet {
            inner: PacketData::BinaryEvent(
                Payload::with_attachments(
                    json.as_array().unwrap().clone(),
                    vec![Bytes::from_static(&[1]), Bytes::from_static(&[2])],
                ),
                ack,
            ),
            ns: ns.into(),
        };

        for (header, ack, ns) in [
            ("52-".to_string(), None, "/"),
            ("52-254".to_string(), Some(254), "/"),
            ("52-/admin™,".to_string(), None, "/admin™"),
            ("52-/admin™,254".to_string(), Some(254), "/admin™"),
        ] {
            let mut state = ParserState::default();
            let payload = format!("{header}{json}");
            assert!(matches!(
                CommonParser.decode_str(&mut state, payload.into()),
                Err(ParseError::NeedsMoreBinaryData)
            ));
            assert!(state.is_pending());
            assert!(matches!(
                CommonParser.decode_bin(&mut state, Bytes::from_static(&[1])),
                Err(ParseError::NeedsMoreBinaryData)
            ));
            let packet = CommonParser
                .decode_bin(&mut state, Bytes::from_static(&[2]))
                .unwrap();
            assert_eq!(packet, comparison_packet(ack, ns));
            assert!(!state.is_pending());
        }
    }

    #[test]
    fn packet_decode_binary_ack() {
        let json = json!([{ "data": "value™" }, { "_placeholder": true, "num": 0}]);
        let mut state = ParserState::default();
        assert!(matches!(
            CommonParser.decode_str(&mut state, format!("61-/admin™,54{}", json).into()),
            Err(ParseError::NeedsMoreBinaryData)
        ));
        let packet = CommonParser
            .decode_bin(&mut state, Bytes::from_static(&[1]))
            .unwrap();
        assert_eq!(
            packet,
            Packet {
                inner: PacketData::BinaryAck(
                    Payload::with_attachments(
                        json.as_array().unwrap().clone(),
                        vec![Bytes::from_static(&[1])]
                    ),
                    54
                ),
                ns: "/admin™".into(),
            }
        );
    }

    #[test]
    fn binary_packet_without_attachments_is_complete() {
        let packet = CommonParser
            .decode_str(&mut ParserState::default(), r#"50-["event"]"#.into())
            .unwrap();
        assert_eq!(
            packet.inner,
            PacketData::BinaryEvent(Payload::event("event", []), None)
        );
    }

    #[test]
    fn text_frame_supersedes_partial_binary_packet() {
        let mut state = ParserState::default();
        let res = CommonParser.decode_str(
            &mut state,
            r#"51-["a",{"_placeholder":true,"num":0}]"#.into(),
        );
        assert!(matches!(res, Err(ParseError::NeedsMoreBinaryData)));

        let packet = CommonParser.decode_str(&mut state, r#"2["b"]"#.into()).unwrap();
        assert_eq!(packet, Packet::event("/", Payload::event("b", []), None));
        assert!(!state.is_pending());
        assert!(matches!(
            CommonParser.decode_bin(&mut state, Bytes::from_static(&[1])),
            Err(ParseError::UnexpectedBinaryPacket)
        ));
    }

    #[test]
    fn packet_reject_invalid_binary_event() {
        let err = CommonParser
            .decode_str(&mut Default::default(), "5invalid".into())
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidAttachments));
    }

    #[test]
    fn packet_reject_invalid_type() {
        for frame in ["", "9[\"a\"]", "a", "7"] {
            let err = CommonParser
                .decode_str(&mut Default::default(), Str::copy_from_slice(frame))
                .unwrap_err();
            assert!(matches!(err, ParseError::InvalidPacketType));
            assert!(err.is_malformed());
        }
    }

    #[test]
    fn unexpected_bin_packet() {
        let err = CommonParser.decode_bin(&mut Default::default(), Bytes::new());
        assert!(matches!(err, Err(ParseError::UnexpectedBinaryPacket)));
    }

    #[test]
    fn check_is_bin_packet_complete() {
        let data = PacketData::BinaryEvent(Payload::default(), None);
        assert!(!is_bin_packet_complete(&data, 2));
        assert!(is_bin_packet_complete(&data, 0));
        let data = PacketData::BinaryAck(Payload::with_attachments(vec![], vec![Bytes::new()]), 12);
        assert!(is_bin_packet_complete(&data, 1));
        assert!(!is_bin_packet_complete(&data, 2));

        // any other packet
        let data = PacketData::Connect(None);
        assert!(is_bin_packet_complete(&data, 0));
        assert!(is_bin_packet_complete(&data, 1));
    }
}
