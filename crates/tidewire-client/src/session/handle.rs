//! Public handle to a session task.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use tidewire_core::config::ClientConfig;

use crate::connection::{ConnectionState, TransportConnection};
use crate::error::{RpcError, SessionError};
use crate::message::packet::HandshakeConfig;
use crate::message::validator::validate_channel_name;
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use crate::timer::TimerService;
use crate::transport::RawTransport;

use super::driver::SessionDriver;
use super::observer::SessionObserver;
use super::registry::{ChannelCallback, RpcCallback};

pub(crate) enum SessionCommand {
    Connect { url: String },
    Disconnect,
    Bind { channel: String, callback: ChannelCallback },
    Unbind { channel: String },
    Rpc {
        method: String,
        params: Vec<Value>,
        callback: RpcCallback,
    },
    Shutdown,
}

/// Channel and call multiplexer over one [`TransportConnection`].
///
/// All state lives on the session task; every method here queues a command
/// and returns. Channel and call callbacks run on that task in the order
/// messages arrived, and must not block.
#[derive(Debug)]
pub struct Session {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<ConnectionState>,
    handshake: watch::Receiver<Option<HandshakeConfig>>,
    metrics: Arc<SessionMetrics>,
    path: String,
}

impl Session {
    /// Starts a session and its connection on the current Tokio runtime.
    ///
    /// `observer` is not kept alive by the session.
    pub fn spawn(
        config: &ClientConfig,
        transport: Arc<dyn RawTransport>,
        timers: TimerService,
        observer: Weak<dyn SessionObserver>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let connection =
            TransportConnection::spawn(transport, timers, config.connection.clone(), event_tx);
        let state = connection.subscribe_state();
        let metrics = Arc::new(SessionMetrics::new());
        let (handshake_tx, handshake) = watch::channel(None);

        let (commands, mailbox) = mpsc::unbounded_channel();
        let driver = SessionDriver::new(
            connection,
            event_rx,
            observer,
            config.reconnect.clone(),
            metrics.clone(),
            handshake_tx,
        );
        tokio::spawn(driver.run(mailbox));

        Self {
            commands,
            state,
            handshake,
            metrics,
            path: config.server.path.clone(),
        }
    }

    /// Connects to `{ws|wss}://{host}:{port}{path}` and keeps the session
    /// connected until [`disconnect`](Self::disconnect).
    pub fn connect(&self, host: &str, port: u16, secure: bool) {
        let url = endpoint_url(host, port, secure, &self.path);
        self.post(SessionCommand::Connect { url });
    }

    /// Disconnects and cancels any pending reconnect.
    pub fn disconnect(&self) {
        self.post(SessionCommand::Disconnect);
    }

    /// Routes events on `channel` to `callback`, replacing an earlier binding.
    pub fn bind<F>(&self, channel: impl Into<String>, callback: F) -> Result<(), SessionError>
    where
        F: FnMut(Vec<Value>) + Send + 'static,
    {
        let channel = channel.into();
        validate_channel_name(&channel)?;
        self.commands
            .send(SessionCommand::Bind {
                channel,
                callback: Box::new(callback),
            })
            .map_err(|_| SessionError::Closed)
    }

    /// Removes the binding for `channel`, if any.
    pub fn unbind(&self, channel: impl Into<String>) {
        self.post(SessionCommand::Unbind {
            channel: channel.into(),
        });
    }

    /// Calls `method` on the server; `callback` runs once with the outcome.
    ///
    /// Fails with [`RpcError::NotConnected`] without sending anything when
    /// the session has no live connection.
    pub fn rpc<F>(&self, method: impl Into<String>, params: Vec<Value>, callback: F)
    where
        F: FnOnce(Result<Vec<Value>, RpcError>) + Send + 'static,
    {
        let command = SessionCommand::Rpc {
            method: method.into(),
            params,
            callback: Box::new(callback),
        };
        if let Err(mpsc::error::SendError(SessionCommand::Rpc { callback, .. })) =
            self.commands.send(command)
        {
            callback(Err(RpcError::SessionClosed));
        }
    }

    /// Awaitable form of [`rpc`](Self::rpc).
    pub async fn call(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<Vec<Value>, RpcError> {
        let (tx, rx) = oneshot::channel();
        self.rpc(method, params, move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await.unwrap_or(Err(RpcError::SessionClosed))
    }

    /// State of the underlying connection.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes the underlying connection's state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Handshake of the live connection, `None` while disconnected.
    pub fn handshake(&self) -> Option<HandshakeConfig> {
        self.handshake.borrow().clone()
    }

    /// Server-assigned id of the live connection.
    pub fn session_id(&self) -> Option<String> {
        self.handshake
            .borrow()
            .as_ref()
            .map(|handshake| handshake.session_id.clone())
    }

    /// Current session counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn post(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            debug!("Session task has stopped; command dropped");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
    }
}

/// Builds the WebSocket URL for an endpoint.
pub fn endpoint_url(host: &str, port: u16, secure: bool, path: &str) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    format!("{scheme}://{host}:{port}{path}")
}
