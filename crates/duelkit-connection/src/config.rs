//! Connection timeouts and the reconnect policy.

use std::time::Duration;

use duelkit_heartbeat::HeartbeatConfig;

/// When and how often to retry after an unsolicited disconnect.
///
/// Backoff is linear: attempt `n` waits `base_delay * n`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Automatic attempts before giving up. Zero disables reconnecting.
    pub max_attempts: u32,
    /// Delay before the first attempt.
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Configuration for the connection manager.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Bound on opening the transport.
    pub connect_timeout: Duration,
    /// Longest the server may stay silent before the connection is
    /// considered dead.
    pub read_timeout: Duration,
    /// Bound on a single outbound frame.
    pub write_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub heartbeat: HeartbeatConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, read: Duration, write: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }
}
