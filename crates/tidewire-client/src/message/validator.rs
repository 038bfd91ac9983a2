//! Channel name validation.

use super::envelope::{DELIMITER, RPC_DISCRIMINATOR};
use crate::error::SessionError;

/// Longest accepted channel name, in bytes.
const MAX_CHANNEL_NAME_LEN: usize = 256;

/// Checks that `channel` can be used as an envelope discriminator.
pub fn validate_channel_name(channel: &str) -> Result<(), SessionError> {
    let reject = |reason| {
        Err(SessionError::InvalidChannel {
            name: channel.to_string(),
            reason,
        })
    };

    if channel.is_empty() {
        return reject("name is empty");
    }
    if channel.len() > MAX_CHANNEL_NAME_LEN {
        return reject("name is longer than 256 bytes");
    }
    if channel.contains(DELIMITER) {
        return reject("name contains the '|' delimiter");
    }
    if channel == RPC_DISCRIMINATOR {
        return reject("name is reserved for remote calls");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_names() {
        assert!(validate_channel_name("chat").is_ok());
        assert!(validate_channel_name("room:42/typing").is_ok());
        assert!(validate_channel_name("RPC").is_ok());
    }

    #[test]
    fn test_rejects_unencodable_names() {
        for name in ["", "a|b", "rpc"] {
            assert!(
                matches!(
                    validate_channel_name(name),
                    Err(SessionError::InvalidChannel { .. })
                ),
                "{name:?} should be rejected"
            );
        }
        assert!(validate_channel_name(&"x".repeat(257)).is_err());
    }
}
