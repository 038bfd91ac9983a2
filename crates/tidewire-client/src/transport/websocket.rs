//! [`RawTransport`] over `tokio-tungstenite`.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::{RawEventSink, RawSocket, RawTransport};

/// Opens WebSocket connections; `wss://` URLs use rustls.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Creates the transport.
    pub fn new() -> Self {
        Self
    }
}

impl RawTransport for WebSocketTransport {
    fn open(&self, url: &str, sink: RawEventSink) -> Box<dyn RawSocket> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(url.to_string(), sink, rx));
        Box::new(WebSocketHandle { outbound: tx })
    }
}

enum Outbound {
    Text(String),
    Close,
}

/// Outbound half handed to the connection.
struct WebSocketHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl RawSocket for WebSocketHandle {
    fn send_text(&mut self, payload: String) {
        let _ = self.outbound.send(Outbound::Text(payload));
    }

    fn close(&mut self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Owns one WebSocket from connect to close.
async fn run_socket(
    url: String,
    sink: RawEventSink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let stream = tokio::select! {
        connected = connect_async(url.as_str()) => match connected {
            Ok((stream, _response)) => stream,
            Err(e) => {
                warn!(url = %url, error = %e, "WebSocket connect failed");
                sink.closed(Some(e.to_string()));
                return;
            }
        },
        // The connection gave up on this socket before it opened.
        _ = wait_for_close(&mut outbound) => {
            debug!(url = %url, "WebSocket connect abandoned");
            return;
        }
    };

    sink.opened();
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => sink.message(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty());
                    debug!(url = %url, reason = ?reason, "WebSocket closed by peer");
                    sink.closed(reason);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(url = %url, error = %e, "WebSocket read failed");
                    sink.closed(Some(e.to_string()));
                    return;
                }
                None => {
                    sink.closed(None);
                    return;
                }
            },
            command = outbound.recv() => match command {
                Some(Outbound::Text(payload)) => {
                    if let Err(e) = write.send(Message::text(payload)).await {
                        warn!(url = %url, error = %e, "WebSocket write failed");
                        sink.closed(Some(e.to_string()));
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    debug!(url = %url, "WebSocket closed locally");
                    return;
                }
            }
        }
    }
}

/// Resolves once a close is requested, discarding frames queued before open.
async fn wait_for_close(outbound: &mut mpsc::UnboundedReceiver<Outbound>) {
    loop {
        match outbound.recv().await {
            Some(Outbound::Close) | None => return,
            Some(Outbound::Text(_)) => {}
        }
    }
}
