//! Error types for the connection layer.

use duelkit_protocol::EncodeError;

/// Errors returned by [`ConnectionHandle`](crate::ConnectionHandle).
///
/// Transport failures are *not* here: they are absorbed by the connection
/// actor (reconnect policy, synthetic error messages) and never cross the
/// handle boundary.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection actor has shut down; no more commands are accepted.
    #[error("connection manager has stopped")]
    Stopped,

    /// An outbound message could not be serialized.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}
