//! Connection state, disconnect reasons, and events reported to the owner.

use std::fmt;

use crate::message::packet::HandshakeConfig;

/// Lifecycle state of a [`TransportConnection`](super::TransportConnection).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected.
    #[default]
    Default,
    /// Socket opening, or open and waiting for the handshake.
    Connecting,
    /// Handshake received; heartbeat running.
    Connected,
    /// Torn down; `connect` may be called again.
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Why a connected transport went down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The owner called `disconnect`.
    Requested,
    /// The server sent a `Close` packet.
    RemoteClosed,
    /// The socket closed underneath the connection.
    TransportClosed(Option<String>),
    /// No ping or pong was seen within one watchdog window.
    HeartbeatTimeout,
}

impl DisconnectReason {
    /// Everything except an owner-requested disconnect.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Requested)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "disconnect requested"),
            Self::RemoteClosed => write!(f, "closed by server"),
            Self::TransportClosed(Some(reason)) => write!(f, "transport closed: {reason}"),
            Self::TransportClosed(None) => write!(f, "transport closed"),
            Self::HeartbeatTimeout => write!(f, "heartbeat timed out"),
        }
    }
}

/// Notifications delivered to the connection's owner, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The handshake completed.
    Connected(HandshakeConfig),
    /// A connected transport went down.
    Disconnected(DisconnectReason),
    /// A connection attempt ended before the handshake.
    ConnectFailed(String),
    /// Payload of a `Message` packet.
    Message(String),
}
