//! The connection task: socket ownership, handshake, heartbeat, teardown.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use tidewire_core::config::connection::ConnectionConfig;

use crate::message::packet::{HandshakeConfig, Packet, PacketType};
use crate::timer::{TimerService, sleep_until_deadline};
use crate::transport::{RawEventSink, RawSocket, RawTransport};

use super::handle::{Command, RawEvent};
use super::heartbeat::Heartbeat;
use super::state::{ConnectionEvent, ConnectionState, DisconnectReason};

pub(crate) struct ConnectionDriver {
    transport: Arc<dyn RawTransport>,
    timers: TimerService,
    runtime: Handle,
    config: ConnectionConfig,
    /// Handed to sinks and timers so their events land in our mailbox.
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: watch::Sender<ConnectionState>,
    /// Bumped on every open and teardown; older events are stale.
    generation: u64,
    socket: Option<Box<dyn RawSocket>>,
    /// URL of the socket most recently opened.
    url: watch::Sender<Option<String>>,
    handshake: Option<HandshakeConfig>,
    heartbeat: Option<Heartbeat>,
    handshake_deadline: Option<Instant>,
}

impl ConnectionDriver {
    pub(crate) fn new(
        transport: Arc<dyn RawTransport>,
        timers: TimerService,
        config: ConnectionConfig,
        commands: mpsc::UnboundedSender<Command>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        state: watch::Sender<ConnectionState>,
        url: watch::Sender<Option<String>>,
    ) -> Self {
        Self {
            transport,
            timers,
            runtime: Handle::current(),
            config,
            commands,
            events,
            state,
            generation: 0,
            socket: None,
            url,
            handshake: None,
            heartbeat: None,
            handshake_deadline: None,
        }
    }

    pub(crate) async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<Command>) {
        loop {
            let command = tokio::select! {
                command = mailbox.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
                () = sleep_until_deadline(self.handshake_deadline) => {
                    self.on_handshake_timeout();
                    continue;
                }
            };

            match command {
                Command::Connect { url } => self.connect(url),
                Command::Disconnect => self.disconnect(),
                Command::Send { message } => self.send(message),
                Command::Raw { generation, event } if generation == self.generation => {
                    self.on_raw_event(event)
                }
                Command::PingTick { generation } if generation == self.generation => {
                    self.on_ping_tick()
                }
                Command::WatchdogTick { generation } if generation == self.generation => {
                    self.on_watchdog_tick()
                }
                Command::Raw { generation, .. }
                | Command::PingTick { generation }
                | Command::WatchdogTick { generation } => {
                    trace!(generation, current = self.generation, "Ignoring stale event");
                }
                Command::Shutdown => break,
            }
        }

        self.stop_heartbeat();
        self.close_socket();
        debug!("Connection task stopped");
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            trace!(from = %previous, to = %state, "Connection state changed");
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            debug!("Connection owner is gone; event dropped");
        }
    }

    fn connect(&mut self, url: String) {
        match self.current_state() {
            ConnectionState::Connected => {
                debug!(url = %url, "Already connected; connect ignored");
                return;
            }
            ConnectionState::Connecting => {
                info!(url = %url, "Replacing in-flight connection attempt");
                self.close_socket();
            }
            ConnectionState::Default | ConnectionState::Disconnected => {}
        }

        self.generation += 1;
        let sink = RawEventSink::new(self.generation, self.commands.clone());
        info!(url = %url, generation = self.generation, "Opening transport");

        self.socket = Some(self.transport.open(&url, sink));
        self.url.send_replace(Some(url));
        self.handshake = None;
        self.handshake_deadline = Some(Instant::now() + self.config.handshake_timeout());
        self.set_state(ConnectionState::Connecting);
    }

    fn disconnect(&mut self) {
        match self.current_state() {
            ConnectionState::Connected => self.tear_down(DisconnectReason::Requested),
            ConnectionState::Connecting => {
                info!("Abandoning connection attempt");
                self.abandon_attempt();
            }
            ConnectionState::Default | ConnectionState::Disconnected => {
                debug!("Not connected; disconnect ignored");
            }
        }
    }

    fn send(&mut self, message: String) {
        if self.current_state() != ConnectionState::Connected {
            debug!(len = message.len(), "Not connected; message dropped");
            return;
        }
        self.write(Packet::message(message));
    }

    fn write(&mut self, packet: Packet) {
        if let Some(socket) = self.socket.as_mut() {
            socket.send_text(packet.encode());
        }
    }

    fn on_raw_event(&mut self, event: RawEvent) {
        match (self.current_state(), event) {
            (ConnectionState::Connecting, RawEvent::Opened) => {
                debug!(generation = self.generation, "Transport open; awaiting handshake");
            }
            (ConnectionState::Connecting, RawEvent::Message(text)) => self.on_handshake(&text),
            (ConnectionState::Connected, RawEvent::Message(text)) => self.on_packet(&text),
            (ConnectionState::Connecting, RawEvent::Closed(reason)) => {
                let reason = reason.unwrap_or_else(|| "transport closed".to_string());
                warn!(reason = %reason, "Transport closed before handshake");
                self.fail_attempt(reason);
            }
            (ConnectionState::Connected, RawEvent::Closed(reason)) => {
                warn!(reason = ?reason, "Transport closed");
                self.tear_down(DisconnectReason::TransportClosed(reason));
            }
            (state, event) => {
                debug!(state = %state, event = ?event, "Ignoring transport event");
            }
        }
    }

    fn on_handshake(&mut self, text: &str) {
        let handshake = match Packet::decode(text).and_then(|packet| packet.handshake()) {
            Ok(handshake) => handshake,
            Err(e) => {
                debug!(error = %e, "Dropping frame received before handshake");
                return;
            }
        };

        let heartbeat = match Heartbeat::start(
            &self.timers,
            &self.runtime,
            &handshake,
            self.generation,
            &self.commands,
        ) {
            Ok(heartbeat) => heartbeat,
            Err(e) => {
                warn!(error = %e, "Could not start heartbeat");
                self.fail_attempt(e.to_string());
                return;
            }
        };

        self.handshake_deadline = None;
        self.heartbeat = Some(heartbeat);
        self.handshake = Some(handshake.clone());
        self.set_state(ConnectionState::Connected);

        info!(
            session_id = %handshake.session_id,
            ping_interval_ms = handshake.ping_interval_ms,
            ping_timeout_ms = handshake.ping_timeout_ms,
            url = ?self.url.borrow().as_deref(),
            "Transport connected"
        );
        self.emit(ConnectionEvent::Connected(handshake));
    }

    fn on_packet(&mut self, text: &str) {
        let packet = match Packet::decode(text) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(error = %e, "Dropping undecodable frame");
                return;
            }
        };

        match packet.kind {
            PacketType::Ping => {
                self.kick_watchdog();
                self.write(Packet::pong(packet.data));
            }
            PacketType::Pong => self.kick_watchdog(),
            PacketType::Message => self.emit(ConnectionEvent::Message(packet.data)),
            PacketType::Close => {
                info!("Server closed the connection");
                self.tear_down(DisconnectReason::RemoteClosed);
            }
            PacketType::Open | PacketType::Upgrade | PacketType::Noop => {
                debug!(kind = ?packet.kind, "Ignoring packet");
            }
        }
    }

    fn kick_watchdog(&mut self) {
        if let Some(heartbeat) = self.heartbeat.as_mut() {
            heartbeat.kick();
        }
    }

    fn on_ping_tick(&mut self) {
        if self.current_state() == ConnectionState::Connected {
            trace!("Sending ping");
            self.write(Packet::ping());
        }
    }

    fn on_watchdog_tick(&mut self) {
        let alive = match self.heartbeat.as_mut() {
            Some(heartbeat) => heartbeat.check(),
            None => return,
        };
        if !alive {
            warn!(
                session_id = ?self.handshake.as_ref().map(|h| h.session_id.as_str()),
                "No heartbeat within the ping timeout; dropping connection"
            );
            self.tear_down(DisconnectReason::HeartbeatTimeout);
        }
    }

    fn on_handshake_timeout(&mut self) {
        self.handshake_deadline = None;
        if self.current_state() == ConnectionState::Connecting {
            warn!(url = ?self.url.borrow().as_deref(), "Handshake timed out");
            self.fail_attempt("handshake timed out".to_string());
        }
    }

    /// Connected → Disconnected, reporting `reason` once.
    fn tear_down(&mut self, reason: DisconnectReason) {
        self.stop_heartbeat();
        self.close_socket();
        self.generation += 1;
        self.handshake_deadline = None;
        self.set_state(ConnectionState::Disconnected);

        info!(reason = %reason, "Transport disconnected");
        self.emit(ConnectionEvent::Disconnected(reason));
    }

    /// Connecting → Disconnected, reporting the failure.
    fn fail_attempt(&mut self, reason: String) {
        self.abandon_attempt();
        self.emit(ConnectionEvent::ConnectFailed(reason));
    }

    /// Connecting → Disconnected without an event.
    fn abandon_attempt(&mut self) {
        self.close_socket();
        self.generation += 1;
        self.handshake_deadline = None;
        self.set_state(ConnectionState::Disconnected);
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
    }

    fn close_socket(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            socket.close();
        }
    }
}
