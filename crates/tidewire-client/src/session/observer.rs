//! Lifecycle notifications delivered to the session's owner.

/// Receives session lifecycle notifications.
///
/// Held by the session through a `Weak` reference: notifications stop once
/// the owner drops its `Arc`. Methods run on the session task and must not
/// block.
pub trait SessionObserver: Send + Sync {
    /// The first handshake of the session's lifetime completed.
    fn on_connected(&self) {}

    /// A handshake completed after an earlier disconnect.
    fn on_reconnected(&self) {}

    /// A connected transport went down, for any reason.
    fn on_disconnected(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
