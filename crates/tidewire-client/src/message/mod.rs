//! Wire formats: transport packets, session envelopes, and validation.

pub mod envelope;
pub mod packet;
pub mod validator;

pub use envelope::Envelope;
pub use packet::{HandshakeConfig, Packet, PacketType};
