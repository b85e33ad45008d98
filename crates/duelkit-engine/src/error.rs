//! Error types for the engine layer.

/// Errors returned by [`DuelHandle`](crate::DuelHandle) and identity
/// providers.
///
/// Protocol and transport problems never show up here; they land in
/// [`DuelState::error`](crate::DuelState::error) instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine task has shut down.
    #[error("duel engine has stopped")]
    Stopped,

    /// The identity provider could not produce a usable identity.
    #[error("identity unavailable: {0}")]
    Identity(String),
}
