//! Public handle to a transport connection task.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use tidewire_core::config::connection::ConnectionConfig;

use crate::timer::TimerService;
use crate::transport::RawTransport;

use super::driver::ConnectionDriver;
use super::state::{ConnectionEvent, ConnectionState};

/// Everything the connection task reacts to, serialized through one mailbox.
#[derive(Debug)]
pub(crate) enum Command {
    Connect { url: String },
    Disconnect,
    Send { message: String },
    Raw { generation: u64, event: RawEvent },
    PingTick { generation: u64 },
    WatchdogTick { generation: u64 },
    Shutdown,
}

/// Socket lifecycle as reported through a [`RawEventSink`](crate::transport::RawEventSink).
#[derive(Debug)]
pub(crate) enum RawEvent {
    Opened,
    Message(String),
    Closed(Option<String>),
}

/// A single heartbeat-supervised connection.
///
/// Calls never block: each one is queued to the connection task, which
/// owns the socket, the timers and the state. Outcomes are reported as
/// [`ConnectionEvent`]s on the sender given to [`spawn`](Self::spawn).
/// Dropping the handle stops the task without emitting further events.
#[derive(Debug)]
pub struct TransportConnection {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    url: watch::Receiver<Option<String>>,
}

impl TransportConnection {
    /// Starts the connection task on the current Tokio runtime.
    pub fn spawn(
        transport: Arc<dyn RawTransport>,
        timers: TimerService,
        config: ConnectionConfig,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        let (commands, mailbox) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Default);
        let (url_tx, url) = watch::channel(None);

        let driver = ConnectionDriver::new(
            transport,
            timers,
            config,
            commands.clone(),
            events,
            state_tx,
            url_tx,
        );
        tokio::spawn(driver.run(mailbox));

        Self {
            commands,
            state,
            url,
        }
    }

    /// Opens a connection to `url` unless one is already established.
    pub fn connect(&self, url: impl Into<String>) {
        self.post(Command::Connect { url: url.into() });
    }

    /// Tears the connection down.
    pub fn disconnect(&self) {
        self.post(Command::Disconnect);
    }

    /// Sends a session-layer message; dropped unless connected.
    pub fn send(&self, message: impl Into<String>) {
        self.post(Command::Send {
            message: message.into(),
        });
    }

    /// Last state published by the connection task.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// URL of the socket most recently opened, kept after it closes.
    ///
    /// A `connect` that was ignored because the connection was already
    /// up does not change it.
    pub fn url(&self) -> Option<String> {
        self.url.borrow().clone()
    }

    fn post(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Connection task has stopped; command dropped");
        }
    }
}

impl Drop for TransportConnection {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}
