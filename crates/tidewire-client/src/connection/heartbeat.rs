//! Ping timer and liveness watchdog for one connected transport.

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::error::TimerError;
use crate::message::packet::HandshakeConfig;
use crate::timer::{IntervalTimer, TimerService};

use super::handle::Command;

/// Heartbeat state for a single connection generation.
///
/// Both timers only post tick commands into the connection's mailbox; the
/// watchdog flag is read and written on the connection task.
#[derive(Debug)]
pub(crate) struct Heartbeat {
    ping: IntervalTimer,
    watchdog: IntervalTimer,
    /// Set when a ping or pong is seen, cleared by every watchdog check.
    kicked: bool,
}

impl Heartbeat {
    /// Starts the ping timer at the handshake's ping interval and the
    /// watchdog at its ping timeout.
    pub(crate) fn start(
        timers: &TimerService,
        runtime: &Handle,
        handshake: &HandshakeConfig,
        generation: u64,
        commands: &mpsc::UnboundedSender<Command>,
    ) -> Result<Self, TimerError> {
        let ping_commands = commands.clone();
        let ping = timers.create_interval_timer(handshake.ping_interval(), runtime, move || {
            let _ = ping_commands.send(Command::PingTick { generation });
        })?;

        let watchdog_commands = commands.clone();
        let watchdog = timers.create_interval_timer(handshake.ping_timeout(), runtime, move || {
            let _ = watchdog_commands.send(Command::WatchdogTick { generation });
        })?;

        Ok(Self {
            ping,
            watchdog,
            kicked: false,
        })
    }

    /// Records a liveness signal.
    pub(crate) fn kick(&mut self) {
        self.kicked = true;
    }

    /// Returns whether a liveness signal arrived since the last check, and
    /// starts a new window.
    pub(crate) fn check(&mut self) -> bool {
        std::mem::replace(&mut self.kicked, false)
    }

    /// Suspends both timers.
    pub(crate) fn stop(&self) {
        self.ping.suspend();
        self.watchdog.suspend();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watchdog_window_resets() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handshake = HandshakeConfig {
            session_id: "s".to_string(),
            ping_interval_ms: 1000,
            ping_timeout_ms: 5000,
            upgrades: Vec::new(),
        };
        let timers = TimerService::new();
        let mut heartbeat = Heartbeat::start(&timers, &Handle::current(), &handshake, 1, &tx)
            .expect("heartbeat should start");
        assert_eq!(timers.active_timers(), 2);

        assert!(!heartbeat.check());
        heartbeat.kick();
        heartbeat.kick();
        assert!(heartbeat.check());
        assert!(!heartbeat.check());

        heartbeat.stop();
        assert_eq!(timers.active_timers(), 0);
    }
}
