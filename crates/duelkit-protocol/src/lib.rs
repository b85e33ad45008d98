//! Wire protocol for duelkit.
//!
//! This crate defines the "language" the duel client and the matchmaking
//! server speak:
//!
//! - **Types** ([`WebSocketMessage`] and its payload structs) — the frames
//!   that travel on the wire.
//! - **Codec** ([`encode`], [`decode`]) — how those frames are converted
//!   to/from bytes.
//! - **Errors** ([`DecodeError`], [`EncodeError`]) — what can go wrong
//!   while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw frames) and the
//! connection manager. It knows nothing about sockets or duels.
//!
//! ```text
//! Transport (bytes) → Protocol (WebSocketMessage) → Dispatcher → Duel state machine
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode, encode, encode_text};
pub use error::{DecodeError, EncodeError};
pub use types::{
    ErrorPayload, GameOverPayload, JoinQueuePayload, MatchFoundPayload,
    OpponentAnswerPayload, OpponentLeftPayload, QuestionPayload,
    QueuedPayload, ScoreUpdatePayload, Scores, SubmitAnswerPayload,
    WebSocketMessage, actions,
};
