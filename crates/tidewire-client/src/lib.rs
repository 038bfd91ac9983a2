//! # tidewire-client
//!
//! Client side of a realtime protocol: a heartbeat-supervised
//! [`TransportConnection`] speaking single-digit-tagged packets, and a
//! [`Session`] that multiplexes named channel events and correlated remote
//! calls over it.
//!
//! Both layers run as a single Tokio task each. Public handles only queue
//! commands; socket events, timer ticks and application calls are handled
//! in arrival order on the owning task.

pub mod connection;
pub mod error;
pub mod message;
pub mod metrics;
pub mod session;
pub mod timer;
pub mod transport;

pub use connection::{ConnectionEvent, ConnectionState, DisconnectReason, TransportConnection};
pub use error::{EnvelopeError, PacketError, RpcError, SessionError, TimerError};
pub use message::{Envelope, HandshakeConfig, Packet, PacketType};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use session::{NoopObserver, Session, SessionObserver};
pub use timer::{IntervalTimer, TimerService};
pub use transport::{RawEventSink, RawSocket, RawTransport, WebSocketTransport};
