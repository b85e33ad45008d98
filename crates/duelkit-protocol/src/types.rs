//! Wire types for the duel protocol.
//!
//! Every frame on the wire is a JSON object of the form
//! `{ "action": "<tag>", "data": { ... } }`. The `action` string picks the
//! variant of [`WebSocketMessage`]; `data` holds that variant's payload.
//!
//! Inbound payloads are lenient: fields the server sometimes omits are
//! `#[serde(default)]` so a sparse frame still decodes. Required fields are
//! the ones the state machine cannot act without (ids, error text).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Action tags
// ---------------------------------------------------------------------------

/// The `action` discriminator values, one per [`WebSocketMessage`] variant.
pub mod actions {
    pub const JOIN_QUEUE: &str = "join_queue";
    pub const QUEUED: &str = "queued";
    pub const MATCH_FOUND: &str = "match_found";
    pub const CURRENT_QUESTION: &str = "current_question";
    pub const QUESTION: &str = "question";
    pub const SUBMIT_ANSWER: &str = "submit_answer";
    pub const SCORE_UPDATE: &str = "score_update";
    pub const OPPONENT_ANSWER: &str = "opponent_answer";
    pub const GAME_OVER: &str = "game_over";
    pub const DUEL_COMPLETE: &str = "duel_complete";
    pub const OPPONENT_LEFT: &str = "opponent_left";
    pub const ERROR: &str = "error";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}

/// Per-player scores keyed by player id.
///
/// A `BTreeMap` rather than a `HashMap` so encoded frames and `Debug`
/// output have a stable key order.
pub type Scores = BTreeMap<String, i64>;

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

/// Client → Server: "Put me in the matchmaking queue."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinQueuePayload {
    pub player_id: String,
    pub display_name: String,
    /// Sent as `null` when the identity has no avatar.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Client → Server: "This is my answer for this round."
///
/// The server keys answers by `(match_id, question_id, round_number)`, so
/// all three travel with every submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAnswerPayload {
    pub match_id: String,
    pub player_id: String,
    pub question_id: String,
    pub answer: String,
    pub round_number: u32,
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// Server → Client: queue registration acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueuedPayload {
    /// 1-based position in the queue, when the server reports it.
    #[serde(default)]
    pub position: Option<u32>,
}

/// Server → Client: an opponent was found and a match room exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFoundPayload {
    pub match_id: String,
    /// Our own id as the server knows it.
    pub player_id: String,
    pub opponent_id: String,
    #[serde(default)]
    pub opponent_name: String,
    #[serde(default)]
    pub opponent_avatar_url: Option<String>,
}

/// Server → Client: the question for a round.
///
/// Shared by the `current_question` and `question` actions, which the
/// server uses interchangeably.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub question_id: String,
    #[serde(default)]
    pub text: String,
    pub round_number: u32,
    /// Multiple-choice options. `None` for free-text questions.
    #[serde(default)]
    pub options: Option<Vec<String>>,
    /// Index into `options`. Only sent in practice/review modes.
    #[serde(default)]
    pub correct_answer: Option<usize>,
    /// Seconds allowed to answer this round.
    #[serde(default)]
    pub time_limit: Option<u64>,
}

/// Server → Client: authoritative scores after someone answered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreUpdatePayload {
    #[serde(default)]
    pub scores: Scores,
    #[serde(default)]
    pub round_number: Option<u32>,
    /// Whose answer triggered this update.
    #[serde(default)]
    pub updated_player_id: Option<String>,
    /// Whether that player's answer was correct.
    #[serde(default)]
    pub correct: Option<bool>,
}

/// Server → Client: the opponent answered the current question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentAnswerPayload {
    pub correct: bool,
    /// The opponent's running score, if the server includes it.
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub round_number: Option<u32>,
}

/// Server → Client: the duel is over.
///
/// Shared by the `game_over` and `duel_complete` actions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameOverPayload {
    /// `None` means a draw.
    #[serde(default)]
    pub winner_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub scores: Scores,
}

/// Server → Client: the opponent disconnected or forfeited.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpponentLeftPayload {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Server → Client: something went wrong server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

// ---------------------------------------------------------------------------
// WebSocketMessage — the envelope
// ---------------------------------------------------------------------------

/// One frame of the duel protocol.
///
/// `#[serde(tag = "action", content = "data")]` produces "adjacently
/// tagged" JSON:
///
/// ```text
/// { "action": "queued", "data": { "position": 3 } }
/// { "action": "ping" }                              ← unit variants carry no data
/// ```
///
/// Only `Serialize` is derived. Decoding goes through
/// [`decode`](crate::decode), which reads `action` first so an unknown tag
/// can be told apart from a broken payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum WebSocketMessage {
    // -- Matchmaking --
    JoinQueue(JoinQueuePayload),
    Queued(QueuedPayload),
    MatchFound(MatchFoundPayload),

    // -- Rounds --
    CurrentQuestion(QuestionPayload),
    #[serde(rename = "question")]
    QuestionReceived(QuestionPayload),
    SubmitAnswer(SubmitAnswerPayload),
    ScoreUpdate(ScoreUpdatePayload),
    OpponentAnswer(OpponentAnswerPayload),

    // -- Completion --
    GameOver(GameOverPayload),
    DuelComplete(GameOverPayload),
    OpponentLeft(OpponentLeftPayload),

    // -- Errors --
    Error(ErrorPayload),

    // -- Keep-alive --
    Ping,
    Pong,
}

impl WebSocketMessage {
    /// Builds an `error` message, as the dispatcher does for frames it
    /// could not decode.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// The wire `action` tag of this message.
    pub fn action(&self) -> &'static str {
        match self {
            Self::JoinQueue(_) => actions::JOIN_QUEUE,
            Self::Queued(_) => actions::QUEUED,
            Self::MatchFound(_) => actions::MATCH_FOUND,
            Self::CurrentQuestion(_) => actions::CURRENT_QUESTION,
            Self::QuestionReceived(_) => actions::QUESTION,
            Self::SubmitAnswer(_) => actions::SUBMIT_ANSWER,
            Self::ScoreUpdate(_) => actions::SCORE_UPDATE,
            Self::OpponentAnswer(_) => actions::OPPONENT_ANSWER,
            Self::GameOver(_) => actions::GAME_OVER,
            Self::DuelComplete(_) => actions::DUEL_COMPLETE,
            Self::OpponentLeft(_) => actions::OPPONENT_LEFT,
            Self::Error(_) => actions::ERROR,
            Self::Ping => actions::PING,
            Self::Pong => actions::PONG,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
