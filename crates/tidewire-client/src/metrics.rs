//! Session counters.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters updated by the session task and readable from any thread.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Handshakes completed, including reconnects
    pub connects: AtomicU64,
    /// Handshakes completed after the first one
    pub reconnects: AtomicU64,
    /// Connected transports that went down
    pub disconnects: AtomicU64,
    /// Envelopes delivered to a channel binding or a pending call
    pub messages_received: AtomicU64,
    /// Inbound messages with no decodable shape or no target
    pub messages_dropped: AtomicU64,
    /// Calls written to the connection
    pub calls_sent: AtomicU64,
    /// Calls resolved with a result
    pub calls_completed: AtomicU64,
    /// Calls resolved with an error
    pub calls_failed: AtomicU64,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
}

impl SessionMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_connected(&self, reconnect: bool) {
        Self::inc(&self.connects);
        if reconnect {
            Self::inc(&self.reconnects);
        }
        if let Ok(mut at) = self.last_connected_at.write() {
            *at = Some(Utc::now());
        }
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            calls_sent: self.calls_sent.load(Ordering::Relaxed),
            calls_completed: self.calls_completed.load(Ordering::Relaxed),
            calls_failed: self.calls_failed.load(Ordering::Relaxed),
            last_connected_at: self.last_connected_at.read().ok().and_then(|at| *at),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Handshakes completed
    pub connects: u64,
    /// Handshakes completed after the first
    pub reconnects: u64,
    /// Connected transports that went down
    pub disconnects: u64,
    /// Inbound envelopes delivered
    pub messages_received: u64,
    /// Inbound messages dropped
    pub messages_dropped: u64,
    /// Calls sent
    pub calls_sent: u64,
    /// Calls resolved with a result
    pub calls_completed: u64,
    /// Calls resolved with an error
    pub calls_failed: u64,
    /// When the last handshake completed
    pub last_connected_at: Option<DateTime<Utc>>,
}
