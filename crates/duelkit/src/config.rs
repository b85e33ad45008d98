//! Client configuration.

use std::time::Duration;

use duelkit_connection::ConnectionConfig;
use duelkit_engine::EngineConfig;

use crate::DuelError;

/// Environment variable holding the duel server URL.
pub const SERVER_URL_ENV: &str = "DUELKIT_SERVER_URL";

/// Everything needed to build a [`DuelClient`](crate::DuelClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `ws://` or `wss://` URL of the duel server.
    pub endpoint: String,
    pub connection: ConnectionConfig,
    pub engine: EngineConfig,
    /// How long [`DuelClient::shutdown`](crate::DuelClient::shutdown) waits
    /// for the workers before aborting them.
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    /// Creates a config with default timeouts for `endpoint`.
    ///
    /// # Errors
    /// [`DuelError::Config`] if `endpoint` is not a `ws://` or `wss://` URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, DuelError> {
        let endpoint = endpoint.into();
        validate_endpoint(&endpoint)?;
        Ok(Self {
            endpoint,
            connection: ConnectionConfig::default(),
            engine: EngineConfig::default(),
            shutdown_timeout: Duration::from_secs(5),
        })
    }

    /// Reads the endpoint from `DUELKIT_SERVER_URL`.
    ///
    /// # Errors
    /// [`DuelError::Config`] if the variable is unset, empty, or not a
    /// WebSocket URL.
    pub fn from_env() -> Result<Self, DuelError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DuelError> {
        let endpoint = lookup(SERVER_URL_ENV)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| DuelError::Config(format!("{SERVER_URL_ENV} is not set")))?;
        Self::new(endpoint)
    }

    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

pub(crate) fn validate_endpoint(endpoint: &str) -> Result<(), DuelError> {
    let rest = endpoint
        .strip_prefix("ws://")
        .or_else(|| endpoint.strip_prefix("wss://"))
        .ok_or_else(|| {
            DuelError::Config(format!("endpoint {endpoint:?} must start with ws:// or wss://"))
        })?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(DuelError::Config(format!("endpoint {endpoint:?} has no host")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_websocket_urls() {
        assert!(ClientConfig::new("ws://localhost:8080/duel").is_ok());
        assert!(ClientConfig::new("wss://duels.example.com/ws").is_ok());
    }

    #[test]
    fn test_new_rejects_other_schemes() {
        for bad in ["http://example.com", "example.com", "ws://", "wss:///path", ""] {
            assert!(
                matches!(ClientConfig::new(bad), Err(DuelError::Config(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("ws://localhost:1").unwrap();
        assert_eq!(config.connection.reconnect.max_attempts, 5);
        assert_eq!(config.engine.join_debounce, Duration::from_secs(3));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_lookup_reads_server_url() {
        let config = ClientConfig::from_lookup(|key| {
            (key == SERVER_URL_ENV).then(|| " wss://duels.example.com/ws ".to_owned())
        })
        .unwrap();
        assert_eq!(config.endpoint, "wss://duels.example.com/ws");
    }

    #[test]
    fn test_from_lookup_missing_variable() {
        let err = ClientConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains(SERVER_URL_ENV));
    }

    #[test]
    fn test_from_lookup_blank_variable() {
        assert!(matches!(
            ClientConfig::from_lookup(|_| Some("   ".into())),
            Err(DuelError::Config(_))
        ));
    }
}
