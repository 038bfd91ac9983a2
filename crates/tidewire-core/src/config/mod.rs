//! Client configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field has a default so an empty file is valid.

pub mod connection;
pub mod logging;
pub mod reconnect;
pub mod server;

use serde::{Deserialize, Serialize};

use self::connection::ConnectionConfig;
use self::logging::LoggingConfig;
use self::reconnect::ReconnectConfig;
use self::server::ServerConfig;

use crate::error::AppError;
use crate::result::AppResult;

/// Root client configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Remote endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Transport connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Automatic reconnection settings.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `TIDEWIRE__`.
    pub fn load(env: &str) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("TIDEWIRE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.validate()?;
        tracing::debug!(env = %env, "Client configuration loaded");
        Ok(loaded)
    }

    /// Parse configuration from a TOML string (used by tests and embedders).
    pub fn from_toml(source: &str) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Rejects settings that would make the client unusable.
    pub fn validate(&self) -> AppResult<()> {
        if self.server.host.trim().is_empty() {
            return Err(AppError::configuration("server.host must not be empty"));
        }
        if self.connection.handshake_timeout_ms == 0 {
            return Err(AppError::configuration(
                "connection.handshake_timeout_ms must be greater than zero",
            ));
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(AppError::configuration(
                "reconnect.multiplier must be at least 1.0",
            ));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(AppError::configuration(
                "reconnect.initial_delay_ms must not exceed reconnect.max_delay_ms",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = ClientConfig::from_toml("").expect("empty config should parse");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(!config.server.secure);
        assert_eq!(config.connection.handshake_timeout_ms, 10_000);
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.max_attempts, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = ClientConfig::from_toml(
            r#"
            [server]
            host = "stream.example.com"
            port = 443
            secure = true

            [reconnect]
            enabled = false
            max_attempts = 3
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.server.host, "stream.example.com");
        assert_eq!(config.server.port, 443);
        assert!(config.server.secure);
        assert_eq!(config.server.path, server::ServerConfig::default().path);
        assert!(!config.reconnect.enabled);
        assert_eq!(config.reconnect.max_attempts, Some(3));
    }

    #[test]
    fn test_rejects_zero_handshake_timeout() {
        let err = ClientConfig::from_toml(
            r#"
            [connection]
            handshake_timeout_ms = 0
            "#,
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_rejects_shrinking_backoff() {
        let err = ClientConfig::from_toml(
            r#"
            [reconnect]
            multiplier = 0.5
            "#,
        )
        .unwrap_err();
        assert!(err.message.contains("multiplier"));
    }
}
