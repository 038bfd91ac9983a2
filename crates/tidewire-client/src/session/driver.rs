//! The session task: dispatch, call correlation, lifecycle, reconnects.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tidewire_core::config::reconnect::ReconnectConfig;

use crate::connection::{ConnectionEvent, DisconnectReason, TransportConnection};
use crate::error::RpcError;
use crate::message::envelope::Envelope;
use crate::message::packet::HandshakeConfig;
use crate::metrics::SessionMetrics;
use crate::timer::sleep_until_deadline;

use super::handle::SessionCommand;
use super::observer::SessionObserver;
use super::reconnect::ReconnectBackoff;
use super::registry::{ChannelBindings, PendingCalls, RpcCallback};

pub(crate) struct SessionDriver {
    connection: TransportConnection,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    observer: Weak<dyn SessionObserver>,
    metrics: Arc<SessionMetrics>,
    bindings: ChannelBindings,
    calls: PendingCalls,
    reconnect: ReconnectConfig,
    backoff: ReconnectBackoff,
    /// Handshake of the live connection.
    handshake: watch::Sender<Option<HandshakeConfig>>,
    /// Set by `connect`, cleared by `disconnect`.
    wants_connection: bool,
    connected: bool,
    /// Whether any handshake has completed in this session's lifetime.
    ever_connected: bool,
    reconnect_at: Option<Instant>,
}

impl SessionDriver {
    pub(crate) fn new(
        connection: TransportConnection,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        observer: Weak<dyn SessionObserver>,
        reconnect: ReconnectConfig,
        metrics: Arc<SessionMetrics>,
        handshake: watch::Sender<Option<HandshakeConfig>>,
    ) -> Self {
        Self {
            connection,
            events,
            observer,
            metrics,
            bindings: ChannelBindings::new(),
            calls: PendingCalls::new(),
            backoff: ReconnectBackoff::new(&reconnect),
            reconnect,
            handshake,
            wants_connection: false,
            connected: false,
            ever_connected: false,
            reconnect_at: None,
        }
    }

    pub(crate) async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<SessionCommand>) {
        loop {
            tokio::select! {
                command = mailbox.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                event = self.events.recv() => match event {
                    Some(event) => self.on_connection_event(event),
                    None => break,
                },
                () = sleep_until_deadline(self.reconnect_at) => self.on_reconnect_due(),
            }
        }

        let failed = self.calls.fail_all(RpcError::SessionClosed);
        SessionMetrics::add(&self.metrics.calls_failed, failed);
        debug!(failed_calls = failed, "Session task stopped");
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { url } => {
                self.wants_connection = true;
                self.reconnect_at = None;
                self.backoff.reset();
                // Reconnects reuse whatever URL the connection actually opened,
                // so a connect ignored while connected cannot redirect them.
                self.connection.connect(url);
            }
            SessionCommand::Disconnect => {
                self.wants_connection = false;
                self.reconnect_at = None;
                self.connection.disconnect();
            }
            SessionCommand::Bind { channel, callback } => {
                if self.bindings.bind(channel.clone(), callback) {
                    debug!(channel = %channel, "Channel binding replaced");
                } else {
                    debug!(channel = %channel, "Channel bound");
                }
            }
            SessionCommand::Unbind { channel } => {
                if self.bindings.unbind(&channel) {
                    debug!(channel = %channel, "Channel unbound");
                }
            }
            SessionCommand::Rpc {
                method,
                params,
                callback,
            } => self.send_call(method, params, callback),
            SessionCommand::Shutdown => {}
        }
    }

    fn send_call(&mut self, method: String, params: Vec<Value>, callback: RpcCallback) {
        if !self.connected {
            debug!(method = %method, "Not connected; call rejected");
            SessionMetrics::inc(&self.metrics.calls_failed);
            callback(Err(RpcError::NotConnected));
            return;
        }

        let id = self.calls.register(callback);
        let envelope = Envelope::call(id, method, params);
        debug!(call_id = id, "Sending call");
        self.connection.send(envelope.encode());
        SessionMetrics::inc(&self.metrics.calls_sent);
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected(handshake) => {
                let reconnect = self.ever_connected;
                self.connected = true;
                self.ever_connected = true;
                self.reconnect_at = None;
                self.backoff.reset();
                self.metrics.record_connected(reconnect);

                info!(session_id = %handshake.session_id, reconnect, "Session connected");
                self.handshake.send_replace(Some(handshake));
                if let Some(observer) = self.observer.upgrade() {
                    if reconnect {
                        observer.on_reconnected();
                    } else {
                        observer.on_connected();
                    }
                }
            }
            ConnectionEvent::Disconnected(reason) => self.on_disconnected(reason),
            ConnectionEvent::ConnectFailed(reason) => {
                warn!(reason = %reason, url = ?self.connection.url(), "Connection attempt failed");
                self.schedule_reconnect();
            }
            ConnectionEvent::Message(text) => self.on_message(&text),
        }
    }

    fn on_disconnected(&mut self, reason: DisconnectReason) {
        self.connected = false;
        self.handshake.send_replace(None);
        SessionMetrics::inc(&self.metrics.disconnects);

        let failed = self.calls.fail_all(RpcError::ConnectionLost);
        if failed > 0 {
            SessionMetrics::add(&self.metrics.calls_failed, failed);
            info!(failed_calls = failed, "Pending calls failed");
        }

        info!(reason = %reason, "Session disconnected");
        if let Some(observer) = self.observer.upgrade() {
            observer.on_disconnected();
        }

        if reason.is_abnormal() {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        if !self.wants_connection || !self.reconnect.enabled || self.connection.url().is_none() {
            return;
        }
        match self.backoff.next_delay() {
            Some(delay) => {
                info!(
                    delay_ms = delay.as_millis() as u64,
                    attempt = self.backoff.attempts(),
                    "Reconnect scheduled"
                );
                self.reconnect_at = Some(Instant::now() + delay);
            }
            None => {
                warn!(attempts = self.backoff.attempts(), "Giving up on reconnecting");
                self.reconnect_at = None;
            }
        }
    }

    fn on_reconnect_due(&mut self) {
        self.reconnect_at = None;
        if !self.wants_connection {
            return;
        }
        if let Some(url) = self.connection.url() {
            info!(url = %url, "Reconnecting");
            self.connection.connect(url);
        }
    }

    fn on_message(&mut self, text: &str) {
        let delivered = match Envelope::decode(text) {
            Ok(Envelope::Reply { id, params, error }) => {
                let outcome = match error {
                    Some(error) => Err(RpcError::Remote(error)),
                    None => Ok(params),
                };
                let succeeded = outcome.is_ok();
                let resolved = self.calls.resolve(id, outcome);
                if resolved {
                    let counter = if succeeded {
                        &self.metrics.calls_completed
                    } else {
                        &self.metrics.calls_failed
                    };
                    SessionMetrics::inc(counter);
                } else {
                    debug!(call_id = id, "Dropping reply for unknown call");
                }
                resolved
            }
            Ok(Envelope::Event { channel, params }) => {
                let dispatched = self.bindings.dispatch(&channel, params);
                if !dispatched {
                    debug!(channel = %channel, "Dropping event for unbound channel");
                }
                dispatched
            }
            Ok(Envelope::Call { id, method, .. }) => {
                debug!(call_id = id, method = %method, "Dropping server-initiated call");
                false
            }
            Err(e) => {
                debug!(error = %e, "Dropping undecodable message");
                false
            }
        };

        let counter = if delivered {
            &self.metrics.messages_received
        } else {
            &self.metrics.messages_dropped
        };
        SessionMetrics::inc(counter);
    }
}
