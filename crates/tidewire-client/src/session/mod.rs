//! Session layer: channel events and remote calls over one connection.

mod driver;
pub mod handle;
pub mod observer;
pub mod reconnect;
pub mod registry;

pub use handle::{Session, endpoint_url};
pub use observer::{NoopObserver, SessionObserver};
pub use reconnect::ReconnectBackoff;
