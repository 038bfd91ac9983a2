//! Reconnect backoff schedule.

use std::time::Duration;

use tidewire_core::config::reconnect::ReconnectConfig;

/// Capped exponential backoff between reconnect attempts.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    max_attempts: Option<u32>,
    /// Attempts scheduled since the last successful handshake.
    attempt: u32,
}

impl ReconnectBackoff {
    /// Builds a schedule from configuration.
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_delay_ms),
            max: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier.max(1.0),
            max_attempts: config.max_attempts,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| self.attempt >= max) {
            return None;
        }

        let factor = self.multiplier.powi(self.attempt.min(i32::MAX as u32) as i32);
        let millis = (self.initial.as_millis() as f64 * factor).min(self.max.as_millis() as f64);
        self.attempt = self.attempt.saturating_add(1);

        Some(Duration::from_millis(millis as u64).min(self.max))
    }

    /// Attempts scheduled since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Starts over after a successful handshake.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
