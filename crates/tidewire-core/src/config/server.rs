//! Remote endpoint configuration.

use serde::{Deserialize, Serialize};

/// Where the client connects to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host name or address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use `wss://` instead of `ws://`.
    #[serde(default)]
    pub secure: bool,
    /// Request path (including query) of the realtime endpoint.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            secure: false,
            path: default_path(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_path() -> String {
    "/engine.io/?EIO=3&transport=websocket".to_string()
}
