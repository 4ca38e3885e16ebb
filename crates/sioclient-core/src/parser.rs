//! The parser seam of the client.
//!
//! A parser turns [`Packet`]s into engine.io messages and back. The default implementation
//! lives in the `sioclient-parser-common` crate.
use std::collections::VecDeque;

use bytes::Bytes;

use crate::{Str, packet::Packet};

/// An encoded packet: one text message followed by its binary attachments, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPacket {
    /// The text frame
    pub data: Str,
    /// The binary frames that must be sent right after the text frame
    pub attachments: VecDeque<Bytes>,
}

/// The state of the parser between two incoming frames.
///
/// It holds a partially received binary packet until all of its attachments arrived.
#[derive(Debug, Default)]
pub struct ParserState {
    /// A binary packet waiting for its attachments
    pub partial_bin_packet: Option<Packet>,
    /// The number of attachments announced by the partial packet header
    pub incoming_binary_cnt: usize,
}

impl ParserState {
    /// Check if a binary packet is waiting for more attachments
    pub fn is_pending(&self) -> bool {
        self.partial_bin_packet.is_some()
    }

    /// Drop any partial packet
    pub fn reset(&mut self) {
        self.partial_bin_packet = None;
        self.incoming_binary_cnt = 0;
    }
}

/// All socket.io parsers should implement this trait.
pub trait Parse: Default + Copy {
    /// Convert a packet into a text frame and its binary attachments
    fn encode(self, packet: Packet) -> EncodedPacket;

    /// Parse a given input string. If the packet needs adjacent binary frames,
    /// the partial packet is kept in the state and [`ParseError::NeedsMoreBinaryData`] is returned.
    fn decode_str(self, state: &mut ParserState, data: Str) -> Result<Packet, ParseError>;

    /// Parse a given binary frame, it must be an attachment of a pending binary packet.
    fn decode_bin(self, state: &mut ParserState, bin: Bytes) -> Result<Packet, ParseError>;
}

/// Errors when parsing socket.io frames. Apart from [`ParseError::NeedsMoreBinaryData`],
/// all of them mean that the frame was malformed.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    /// Invalid packet type
    #[error("invalid packet type")]
    InvalidPacketType,

    /// Invalid namespace
    #[error("invalid namespace")]
    InvalidNamespace,

    /// Missing or invalid ack id
    #[error("invalid ack id")]
    InvalidAckId,

    /// Invalid attachments
    #[error("invalid attachments")]
    InvalidAttachments,

    /// The json payload is invalid or does not have the expected shape
    #[error("invalid data: {0}")]
    InvalidData(#[from] serde_json::Error),

    /// The json payload is valid but is not an array
    #[error("invalid payload: expected a json array")]
    InvalidPayload,

    /// Received a binary frame while no binary packet was pending
    #[error(
        "received unexpected binary data. Make sure you are using the same parser on both ends."
    )]
    UnexpectedBinaryPacket,

    /// Needs more binary data before deserialization. It is not exactly an error, it is used for
    /// control flow, the parser returns it n times for n expected attachments.
    #[error("needs more binary data before deserialization")]
    NeedsMoreBinaryData,
}

impl ParseError {
    /// Check if the error means that the frame is malformed
    /// (as opposed to the [`ParseError::NeedsMoreBinaryData`] control flow variant).
    pub fn is_malformed(&self) -> bool {
        !matches!(self, ParseError::NeedsMoreBinaryData)
    }
}
