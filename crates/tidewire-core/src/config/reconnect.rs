//! Automatic reconnection configuration.

use serde::{Deserialize, Serialize};

/// Backoff policy used by the session layer after an abnormal disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Whether the session reconnects on its own.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay before the first reconnect attempt.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Growth factor applied per failed attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Consecutive failed attempts before giving up (`None` = never).
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            max_attempts: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}
