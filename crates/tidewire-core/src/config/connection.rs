//! Transport connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the transport connection state machine.
///
/// Heartbeat timing is not configured here: the server dictates the ping
/// interval and timeout in its handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// How long to wait for the server handshake after opening a socket.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
}

impl ConnectionConfig {
    /// Handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: default_handshake_timeout(),
        }
    }
}

fn default_handshake_timeout() -> u64 {
    10_000
}
