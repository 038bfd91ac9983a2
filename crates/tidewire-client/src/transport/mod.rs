//! Raw socket capability consumed by the transport connection.
//!
//! A [`RawTransport`] opens sockets; each open reports its lifecycle
//! through the [`RawEventSink`] it was handed and is driven through the
//! returned [`RawSocket`].

pub mod websocket;

use tokio::sync::mpsc;

use crate::connection::handle::{Command, RawEvent};

pub use websocket::WebSocketTransport;

/// Opens text-message sockets.
pub trait RawTransport: Send + Sync {
    /// Starts opening a socket to `url`.
    ///
    /// Must not block: the open completes asynchronously and is reported
    /// through `sink`, as is any failure (`closed` with a reason).
    fn open(&self, url: &str, sink: RawEventSink) -> Box<dyn RawSocket>;
}

/// Outbound side of an opened (or opening) socket.
pub trait RawSocket: Send {
    /// Queues a text frame.
    fn send_text(&mut self, payload: String);

    /// Closes the socket. No further events need to be reported.
    fn close(&mut self);
}

/// Reports socket lifecycle events back to the owning connection.
///
/// Every sink is tagged with the connection attempt it belongs to, so
/// events from a socket that has since been replaced are ignored.
#[derive(Debug, Clone)]
pub struct RawEventSink {
    generation: u64,
    commands: mpsc::UnboundedSender<Command>,
}

impl RawEventSink {
    pub(crate) fn new(generation: u64, commands: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            generation,
            commands,
        }
    }

    /// The socket finished opening.
    pub fn opened(&self) {
        self.report(RawEvent::Opened);
    }

    /// A whole text message arrived.
    pub fn message(&self, text: impl Into<String>) {
        self.report(RawEvent::Message(text.into()));
    }

    /// The socket closed, normally or not.
    pub fn closed(&self, reason: Option<String>) {
        self.report(RawEvent::Closed(reason));
    }

    fn report(&self, event: RawEvent) {
        let _ = self.commands.send(Command::Raw {
            generation: self.generation,
            event,
        });
    }
}
