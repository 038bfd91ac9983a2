//! Error types for the realtime client.
//!
//! Each layer has its own enum; all of them map into
//! [`tidewire_core::error::AppError`] for callers that want one error type.

use thiserror::Error;

use tidewire_core::error::{AppError, ErrorKind};

use crate::message::packet::PacketType;

/// Failure to decode a transport packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// The frame had no type tag.
    #[error("empty packet")]
    Empty,
    /// The type tag is not a known packet type.
    #[error("unknown packet type tag '{0}'")]
    UnknownType(char),
    /// A handshake was expected but another packet arrived.
    #[error("expected an open packet, got {0:?}")]
    NotOpen(PacketType),
    /// The open packet payload is not a valid handshake.
    #[error("malformed handshake: {0}")]
    Handshake(String),
}

/// Failure to decode a session envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// No `|` between discriminator and body.
    #[error("envelope has no discriminator delimiter")]
    MissingDelimiter,
    /// The discriminator before `|` is empty.
    #[error("envelope discriminator is empty")]
    EmptyDiscriminator,
    /// The body is not the JSON shape the discriminator calls for.
    #[error("envelope body is not valid: {0}")]
    Body(#[from] serde_json::Error),
}

/// Outcome of a remote call that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The call was issued while the session had no live connection.
    #[error("not connected")]
    NotConnected,
    /// The connection dropped before the reply arrived.
    #[error("connection lost before a reply arrived")]
    ConnectionLost,
    /// The session was shut down.
    #[error("session closed")]
    SessionClosed,
    /// The server answered with an error.
    #[error("remote error: {0}")]
    Remote(String),
}

/// Errors returned synchronously by the session handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The channel name cannot be carried by the envelope format.
    #[error("invalid channel name '{name}': {reason}")]
    InvalidChannel {
        /// Rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// The session task is gone.
    #[error("session closed")]
    Closed,
}

/// Errors creating an interval timer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// Repeating timers need a non-zero period.
    #[error("interval must be greater than zero")]
    ZeroInterval,
}

impl From<PacketError> for AppError {
    fn from(err: PacketError) -> Self {
        Self::with_source(ErrorKind::Protocol, err.to_string(), err)
    }
}

impl From<EnvelopeError> for AppError {
    fn from(err: EnvelopeError) -> Self {
        Self::with_source(ErrorKind::Protocol, err.to_string(), err)
    }
}

impl From<RpcError> for AppError {
    fn from(err: RpcError) -> Self {
        let kind = match err {
            RpcError::NotConnected => ErrorKind::NotConnected,
            RpcError::SessionClosed => ErrorKind::SessionClosed,
            RpcError::ConnectionLost | RpcError::Remote(_) => ErrorKind::Rpc,
        };
        Self::with_source(kind, err.to_string(), err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let kind = match err {
            SessionError::InvalidChannel { .. } => ErrorKind::Validation,
            SessionError::Closed => ErrorKind::SessionClosed,
        };
        Self::with_source(kind, err.to_string(), err)
    }
}

impl From<TimerError> for AppError {
    fn from(err: TimerError) -> Self {
        Self::with_source(ErrorKind::Validation, err.to_string(), err)
    }
}
