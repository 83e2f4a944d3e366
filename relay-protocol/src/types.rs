//! Core constants and small utility codecs, mirroring `uam.protocol.types`.

use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Protocol version advertised in every envelope and contact card.
pub const UAM_VERSION: &str = "0.1";

/// Maximum serialized envelope size, in bytes.
pub const MAX_ENVELOPE_SIZE: usize = 65_536;

/// All UAM message types. Serializes to/from its wire string (`"message"`,
/// `"handshake.request"`, ...) rather than a Rust-style variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[serde(rename = "message")]
    Message,
    #[serde(rename = "handshake.request")]
    HandshakeRequest,
    #[serde(rename = "handshake.accept")]
    HandshakeAccept,
    #[serde(rename = "handshake.deny")]
    HandshakeDeny,
    #[serde(rename = "receipt.delivered")]
    ReceiptDelivered,
    #[serde(rename = "receipt.read")]
    ReceiptRead,
    #[serde(rename = "receipt.failed")]
    ReceiptFailed,
    #[serde(rename = "session.request")]
    SessionRequest,
    #[serde(rename = "session.accept")]
    SessionAccept,
    #[serde(rename = "session.decline")]
    SessionDecline,
    #[serde(rename = "session.end")]
    SessionEnd,
}

impl MessageType {
    /// The literal wire string for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Message => "message",
            MessageType::HandshakeRequest => "handshake.request",
            MessageType::HandshakeAccept => "handshake.accept",
            MessageType::HandshakeDeny => "handshake.deny",
            MessageType::ReceiptDelivered => "receipt.delivered",
            MessageType::ReceiptRead => "receipt.read",
            MessageType::ReceiptFailed => "receipt.failed",
            MessageType::SessionRequest => "session.request",
            MessageType::SessionAccept => "session.accept",
            MessageType::SessionDecline => "session.decline",
            MessageType::SessionEnd => "session.end",
        }
    }

    /// True for message types that must use SealedBox (anonymous sender)
    /// rather than authenticated Box, per spec §4.2.
    pub fn uses_sealed_box(&self) -> bool {
        matches!(self, MessageType::HandshakeRequest)
    }
}

/// URL-safe base64 encode, padding stripped (matches Python's
/// `base64.urlsafe_b64encode(...).rstrip(b"=")`).
pub fn b64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

/// URL-safe base64 decode, tolerating missing padding.
pub fn b64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s.trim_end_matches('='))
}

/// Canonical UTC timestamp: `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn b64_round_trips_without_padding() {
        let data = b"hello world, this needs padding!";
        let encoded = b64_encode(data);
        assert!(!encoded.contains('='));
        assert_eq!(b64_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn message_type_wire_strings() {
        assert_eq!(MessageType::HandshakeRequest.as_str(), "handshake.request");
        assert!(MessageType::HandshakeRequest.uses_sealed_box());
        assert!(!MessageType::Message.uses_sealed_box());
    }

    #[test]
    fn timestamp_has_millis_and_zulu_suffix() {
        let ts = utc_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('.'));
    }
}
