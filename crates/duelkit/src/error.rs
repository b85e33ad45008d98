//! Unified error type for duelkit.

use duelkit_connection::ConnectionError;
use duelkit_engine::EngineError;

/// Top-level error returned by [`DuelClient`](crate::DuelClient).
///
/// Runtime failures of a live duel (dropped connections, server errors,
/// undecodable frames) are not reported through this type. They show up in
/// [`DuelState`](duelkit_engine::DuelState) instead. `DuelError` covers
/// setup mistakes and calls made after shutdown.
#[derive(Debug, thiserror::Error)]
pub enum DuelError {
    /// Missing or invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The connection manager is gone.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The duel engine is gone, or identity lookup failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
