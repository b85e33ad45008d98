//! The connection status as seen by the rest of the client.

use std::fmt;

/// Lifecycle state of the connection to the duel server.
///
/// Only the connection actor writes this. Everyone else observes it through
/// [`ConnectionHandle::status`](crate::ConnectionHandle::status) or as
/// [`Inbound::Status`](crate::Inbound::Status) entries in the inbox.
///
/// ```text
/// Disconnected ──connect()──→ Connecting ──ok──→ Connected
///      ↑                          │                  │
///      │                        fail            close/error
///      │                          ▼                  ▼
///      │                        Error ──(attempts left)──→ Reconnecting ──delay──→ Connecting
///      │                          │
///      │                     (exhausted: stays Error)
///      │
///      └── Disconnecting ←──disconnect()── Connected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Reconnecting,
    Error,
}

impl ConnectionStatus {
    /// Returns `true` only for [`ConnectionStatus::Connected`].
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` while a connection attempt is underway or scheduled.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}
