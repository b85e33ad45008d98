//! The published duel snapshot and the types inside it.
//!
//! [`DuelState`] is the only thing the presentation layer ever sees. The
//! engine replaces it wholesale on every transition (it is shared as an
//! `Arc<DuelState>` and cloned before mutation), so a reader holding an
//! older snapshot never observes a half-applied update.

use std::fmt;
use std::time::{Duration, SystemTime};

use duelkit_connection::ConnectionStatus;
use duelkit_protocol::{QuestionPayload, Scores};

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// A player as shown in a duel. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelUser {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl DuelUser {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    #[must_use]
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

/// Lifecycle of a [`DuelRoom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// Matched, waiting for the first question.
    Matched,
    /// At least one question has been asked.
    InProgress,
}

/// A matched pair of players. Exists from `match_found` until the duel
/// completes or a player leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelRoom {
    /// The server's match id.
    pub id: String,
    /// Always the local user.
    pub player1: DuelUser,
    pub player2: Option<DuelUser>,
    pub status: RoomStatus,
}

impl DuelRoom {
    pub fn opponent_id(&self) -> Option<&str> {
        self.player2.as_ref().map(|p| p.id.as_str())
    }
}

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

/// One round's question. Replaced each round, never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub round_number: u32,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<usize>,
    pub time_limit: Option<Duration>,
}

impl From<QuestionPayload> for Question {
    fn from(p: QuestionPayload) -> Self {
        Self {
            id: p.question_id,
            text: p.text,
            round_number: p.round_number,
            options: p.options,
            correct_answer: p.correct_answer,
            time_limit: p.time_limit.map(Duration::from_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// How a finished duel went for the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelOutcome {
    Won,
    Lost,
    Draw,
}

/// Final result of a duel, kept until the next one starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelResult {
    /// `None` for a draw.
    pub winner_id: Option<String>,
    pub reason: Option<String>,
    pub scores: Scores,
    pub outcome: DuelOutcome,
}

impl DuelResult {
    pub(crate) fn outcome_for(winner_id: Option<&str>, me: Option<&str>) -> DuelOutcome {
        match (winner_id, me) {
            (None, _) => DuelOutcome::Draw,
            (Some(w), Some(me)) if w == me => DuelOutcome::Won,
            (Some(_), _) => DuelOutcome::Lost,
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Coarse position in the duel lifecycle, derived from the other fields.
///
/// ```text
/// Idle → Connecting → Queued → MatchFound → InProgress(round N) → Complete
/// ```
///
/// `Connecting` covers everything between `start_duel` and the server's
/// `queued` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuelPhase {
    #[default]
    Idle,
    Connecting,
    Queued,
    MatchFound,
    InProgress { round: u32 },
    Complete,
}

impl fmt::Display for DuelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Queued => write!(f, "queued"),
            Self::MatchFound => write!(f, "match found"),
            Self::InProgress { round } => write!(f, "round {round}"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

// ---------------------------------------------------------------------------
// DuelState
// ---------------------------------------------------------------------------

/// Everything the presentation layer can observe about the duel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DuelState {
    pub connection: ConnectionStatus,
    pub phase: DuelPhase,
    pub local_user: Option<DuelUser>,

    // -- Matchmaking --
    /// A join was requested and not yet acknowledged.
    pub is_searching: bool,
    pub is_in_queue: bool,
    pub queue_position: Option<u32>,
    /// When the server first acknowledged the current queue entry.
    pub queued_at: Option<SystemTime>,

    // -- Duel --
    pub room: Option<DuelRoom>,
    pub question: Option<Question>,
    pub current_round: u32,
    pub scores: Scores,

    // -- Current round --
    pub has_answered: bool,
    pub selected_answer: Option<String>,
    /// Whether the local user's last answer was correct. Only ever set
    /// from updates about the local user.
    pub last_answer_correct: Option<bool>,
    pub opponent_answered: bool,
    pub opponent_last_correct: Option<bool>,
    pub round_timed_out: bool,

    pub result: Option<DuelResult>,
    /// The current user-visible error, if any.
    pub error: Option<String>,
}

impl DuelState {
    /// Id the server knows the local user by.
    pub fn my_id(&self) -> Option<&str> {
        self.local_user
            .as_ref()
            .map(|u| u.id.as_str())
            .or_else(|| self.room.as_ref().map(|r| r.player1.id.as_str()))
    }

    /// Score for `player_id`, zero when unknown.
    pub fn score_of(&self, player_id: &str) -> i64 {
        self.scores.get(player_id).copied().unwrap_or(0)
    }

    /// Whether an answer can be submitted right now.
    pub fn can_answer(&self) -> bool {
        self.room.is_some() && self.question.is_some() && !self.has_answered && !self.round_timed_out
    }

    pub(crate) fn derive_phase(&self) -> DuelPhase {
        if let Some(room) = &self.room {
            return match (&self.question, room.status) {
                (Some(_), _) | (None, RoomStatus::InProgress) => DuelPhase::InProgress {
                    round: self.current_round,
                },
                (None, RoomStatus::Matched) => DuelPhase::MatchFound,
            };
        }
        if self.is_in_queue {
            DuelPhase::Queued
        } else if self.is_searching {
            DuelPhase::Connecting
        } else if self.result.is_some() {
            DuelPhase::Complete
        } else {
            DuelPhase::Idle
        }
    }

    /// Forgets queue membership.
    pub(crate) fn clear_queue(&mut self) {
        self.is_searching = false;
        self.is_in_queue = false;
        self.queue_position = None;
        self.queued_at = None;
    }

    /// Forgets the per-round answer flags. Correctness of the previous
    /// round stays until the next score update replaces it.
    pub(crate) fn clear_round(&mut self) {
        self.has_answered = false;
        self.selected_answer = None;
        self.opponent_answered = false;
        self.round_timed_out = false;
    }

    /// Forgets the room and everything that belongs to it.
    pub(crate) fn clear_room(&mut self) {
        self.room = None;
        self.question = None;
        self.clear_round();
        self.last_answer_correct = None;
        self.opponent_last_correct = None;
    }
}
