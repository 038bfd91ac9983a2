//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tidewire_client::{RawEventSink, RawSocket, RawTransport};

/// Transport that records every socket it opens instead of touching the network.
#[derive(Clone, Default)]
pub struct MockTransport {
    sockets: Arc<Mutex<Vec<MockPeer>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `open` calls so far.
    pub fn opened(&self) -> usize {
        self.sockets.lock().unwrap().len()
    }

    /// Server side of the `index`-th socket.
    pub fn socket(&self, index: usize) -> MockPeer {
        self.sockets.lock().unwrap()[index].clone()
    }

    /// Server side of the most recent socket.
    pub fn last(&self) -> MockPeer {
        self.sockets
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no socket has been opened")
    }
}

impl RawTransport for MockTransport {
    fn open(&self, url: &str, sink: RawEventSink) -> Box<dyn RawSocket> {
        let peer = MockPeer {
            state: Arc::new(PeerState {
                url: url.to_string(),
                sink,
                sent: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        };
        self.sockets.lock().unwrap().push(peer.clone());
        Box::new(MockSocket { peer })
    }
}

struct PeerState {
    url: String,
    sink: RawEventSink,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

/// Test-side view of one mock socket: plays the server.
#[derive(Clone)]
pub struct MockPeer {
    state: Arc<PeerState>,
}

impl MockPeer {
    pub fn url(&self) -> &str {
        &self.state.url
    }

    /// Reports the socket as open.
    pub fn accept(&self) {
        self.state.sink.opened();
    }

    /// Delivers a raw text frame to the client.
    pub fn receive(&self, frame: impl Into<String>) {
        self.state.sink.message(frame);
    }

    /// Opens the socket and sends an `Open` packet.
    pub fn handshake(&self, sid: &str, ping_interval_ms: u64, ping_timeout_ms: u64) {
        self.accept();
        self.receive(format!(
            r#"0{{"sid":"{sid}","pingInterval":{ping_interval_ms},"pingTimeout":{ping_timeout_ms},"upgrades":[]}}"#
        ));
    }

    /// Delivers a `Message` packet carrying `payload`.
    pub fn send_message(&self, payload: &str) {
        self.receive(format!("4{payload}"));
    }

    /// Simulates the socket dying underneath the client.
    pub fn drop_connection(&self, reason: Option<&str>) {
        self.state.sink.closed(reason.map(str::to_string));
    }

    /// Frames the client has written, in order.
    pub fn sent(&self) -> Vec<String> {
        self.state.sent.lock().unwrap().clone()
    }

    /// Frames the client has written that start with `tag`.
    pub fn sent_with_tag(&self, tag: char) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|frame| frame.starts_with(tag))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

struct MockSocket {
    peer: MockPeer,
}

impl RawSocket for MockSocket {
    fn send_text(&mut self, payload: String) {
        self.peer.state.sent.lock().unwrap().push(payload);
    }

    fn close(&mut self) {
        self.peer.state.closed.store(true, Ordering::SeqCst);
    }
}

/// Lets every ready task run until the mailboxes drain.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Advances the paused clock, then settles.
pub async fn advance(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}
