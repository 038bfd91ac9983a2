//! Transport connection: handshake, heartbeat, and lifecycle reporting.

mod driver;
pub(crate) mod handle;
mod heartbeat;
pub mod state;

pub use handle::TransportConnection;
pub use state::{ConnectionEvent, ConnectionState, DisconnectReason};
