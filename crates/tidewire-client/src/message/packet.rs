//! Transport-layer packets: a one-digit type tag followed by the payload.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PacketError;

/// Transport packet type, encoded as the leading ASCII digit of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Handshake from the server, carries [`HandshakeConfig`] as JSON.
    Open,
    /// Orderly shutdown of the connection.
    Close,
    /// Liveness probe.
    Ping,
    /// Liveness answer.
    Pong,
    /// Session-layer payload.
    Message,
    /// Transport upgrade notice.
    Upgrade,
    /// Filler packet with no meaning.
    Noop,
}

impl PacketType {
    /// Parses a type tag.
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            '0' => Some(Self::Open),
            '1' => Some(Self::Close),
            '2' => Some(Self::Ping),
            '3' => Some(Self::Pong),
            '4' => Some(Self::Message),
            '5' => Some(Self::Upgrade),
            '6' => Some(Self::Noop),
            _ => None,
        }
    }

    /// The type tag written on the wire.
    pub fn tag(self) -> char {
        match self {
            Self::Open => '0',
            Self::Close => '1',
            Self::Ping => '2',
            Self::Pong => '3',
            Self::Message => '4',
            Self::Upgrade => '5',
            Self::Noop => '6',
        }
    }
}

/// A decoded transport packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet type.
    pub kind: PacketType,
    /// Everything after the type tag.
    pub data: String,
}

impl Packet {
    /// Creates a packet.
    pub fn new(kind: PacketType, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    /// Ping with no payload.
    pub fn ping() -> Self {
        Self::new(PacketType::Ping, "")
    }

    /// Pong echoing `data`.
    pub fn pong(data: impl Into<String>) -> Self {
        Self::new(PacketType::Pong, data)
    }

    /// Session-layer message.
    pub fn message(data: impl Into<String>) -> Self {
        Self::new(PacketType::Message, data)
    }

    /// Close with no payload.
    pub fn close() -> Self {
        Self::new(PacketType::Close, "")
    }

    /// Serializes the packet into a text frame.
    pub fn encode(&self) -> String {
        let mut frame = String::with_capacity(self.data.len() + 1);
        frame.push(self.kind.tag());
        frame.push_str(&self.data);
        frame
    }

    /// Parses a text frame.
    pub fn decode(frame: &str) -> Result<Self, PacketError> {
        let mut chars = frame.chars();
        let tag = chars.next().ok_or(PacketError::Empty)?;
        let kind = PacketType::from_tag(tag).ok_or(PacketError::UnknownType(tag))?;
        Ok(Self::new(kind, chars.as_str()))
    }

    /// Interprets an `Open` packet's payload as the server handshake.
    pub fn handshake(&self) -> Result<HandshakeConfig, PacketError> {
        if self.kind != PacketType::Open {
            return Err(PacketError::NotOpen(self.kind));
        }
        let handshake: HandshakeConfig = serde_json::from_str(&self.data)
            .map_err(|e| PacketError::Handshake(e.to_string()))?;
        if handshake.ping_interval_ms == 0 || handshake.ping_timeout_ms == 0 {
            return Err(PacketError::Handshake(
                "ping interval and timeout must be non-zero".to_string(),
            ));
        }
        Ok(handshake)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.tag(), self.data)
    }
}

/// Per-connection settings announced by the server in its `Open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// Server-assigned session id.
    #[serde(rename = "sid", alias = "sessionId")]
    pub session_id: String,
    /// How often the client pings.
    #[serde(rename = "pingInterval", alias = "pingIntervalMs")]
    pub ping_interval_ms: u64,
    /// Liveness window checked by the watchdog.
    #[serde(rename = "pingTimeout", alias = "pingTimeoutMs")]
    pub ping_timeout_ms: u64,
    /// Transports the server offers to upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,
}

impl HandshakeConfig {
    /// Ping period.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Watchdog period.
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tags() {
        assert_eq!(Packet::decode("2").unwrap(), Packet::ping());
        assert_eq!(Packet::decode("3probe").unwrap(), Packet::pong("probe"));
        assert_eq!(
            Packet::decode("4chat|[\"hi\"]").unwrap(),
            Packet::message("chat|[\"hi\"]")
        );
        assert_eq!(Packet::decode("1").unwrap(), Packet::close());
        assert_eq!(Packet::decode("6").unwrap().kind, PacketType::Noop);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(Packet::decode(""), Err(PacketError::Empty));
        assert_eq!(Packet::decode("9x"), Err(PacketError::UnknownType('9')));
        assert_eq!(Packet::decode("hello"), Err(PacketError::UnknownType('h')));
    }

    #[test]
    fn test_encode_prefixes_tag() {
        assert_eq!(Packet::ping().encode(), "2");
        assert_eq!(Packet::message("x|[]").encode(), "4x|[]");
        assert_eq!(Packet::pong("probe").to_string(), "3probe");
    }

    #[test]
    fn test_handshake_wire_names() {
        let packet = Packet::decode(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":60000}"#,
        )
        .unwrap();
        let handshake = packet.handshake().unwrap();
        assert_eq!(handshake.session_id, "abc");
        assert_eq!(handshake.ping_interval(), Duration::from_millis(25_000));
        assert_eq!(handshake.ping_timeout(), Duration::from_millis(60_000));
    }

    #[test]
    fn test_handshake_aliases() {
        let packet =
            Packet::decode(r#"0{"sessionId":"abc","pingIntervalMs":1000,"pingTimeout":5000}"#)
                .unwrap();
        let handshake = packet.handshake().unwrap();
        assert_eq!(handshake.session_id, "abc");
        assert_eq!(handshake.ping_interval_ms, 1000);
        assert_eq!(handshake.ping_timeout_ms, 5000);
        assert!(handshake.upgrades.is_empty());
    }

    #[test]
    fn test_handshake_rejections() {
        assert_eq!(
            Packet::ping().handshake(),
            Err(PacketError::NotOpen(PacketType::Ping))
        );
        assert!(matches!(
            Packet::decode("0not json").unwrap().handshake(),
            Err(PacketError::Handshake(_))
        ));
        assert!(matches!(
            Packet::decode(r#"0{"sid":"a","pingInterval":0,"pingTimeout":10}"#)
                .unwrap()
                .handshake(),
            Err(PacketError::Handshake(_))
        ));
    }
}
