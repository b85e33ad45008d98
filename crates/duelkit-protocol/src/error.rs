//! Error types for the protocol layer.
//!
//! Decoding and encoding fail in different ways and callers react to them
//! differently, so they get separate enums. A [`DecodeError`] is never fatal:
//! the dispatcher turns it into a synthetic protocol error (or drops it, for
//! [`DecodeError::UnrecognizedAction`]) and keeps reading.

/// Errors produced while turning a raw frame into a [`WebSocketMessage`].
///
/// The variants are ordered by how far decoding got before failing:
///
/// ```text
/// bytes ──(parse {action, data})──→ action ──(lookup)──→ payload type ──(parse data)──→ message
///        InvalidFrame                      UnrecognizedAction          MalformedPayload
/// ```
///
/// [`WebSocketMessage`]: crate::WebSocketMessage
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not a JSON object with a string `action` field.
    /// Nothing about the message could be recovered.
    #[error("invalid frame: {0}")]
    InvalidFrame(#[source] serde_json::Error),

    /// The frame is well-formed but its `action` is not one we know.
    ///
    /// Servers add actions over time, so this is expected traffic from a
    /// newer server rather than a protocol desync.
    #[error("unrecognized action: {0:?}")]
    UnrecognizedAction(String),

    /// The `action` is known but `data` does not match its payload shape
    /// (missing required field, wrong type, ...).
    #[error("malformed payload for action {action:?}: {source}")]
    MalformedPayload {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// The action string, when decoding got far enough to read one.
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::InvalidFrame(_) => None,
            Self::UnrecognizedAction(action) => Some(action),
            Self::MalformedPayload { action, .. } => Some(action),
        }
    }
}

/// Serialization of an outbound message failed.
///
/// With the payload types in this crate this only happens on allocation
/// failure or a serde bug; it is still surfaced instead of unwrapped.
#[derive(Debug, thiserror::Error)]
#[error("encode failed: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);
