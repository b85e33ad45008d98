//! The duel state machine.
//!
//! [`DuelMachine`] is the pure transition core: it takes inputs (user
//! intents, inbox entries, timer expiries), updates the [`DuelState`]
//! snapshot, and returns the [`Effect`]s the caller must carry out. It does
//! no I/O and reads no clocks, so every transition is testable without a
//! runtime. [`DuelEngine`](crate::DuelEngine) is the worker that feeds it.
//!
//! # Error triage
//!
//! Server `error` messages fall into three buckets:
//!
//! | message contains                          | effect                                  |
//! |-------------------------------------------|-----------------------------------------|
//! | `already registered`, `already in queue`, `already queued` | treated as a queue acknowledgement |
//! | `unsupported action`, `unknown action`    | ignored                                 |
//! | anything else                             | stored in [`DuelState::error`]          |
//!
//! Matching is case-insensitive.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use duelkit_connection::{ConnectionStatus, Inbound};
use duelkit_protocol::{
    GameOverPayload, JoinQueuePayload, MatchFoundPayload, OpponentAnswerPayload,
    OpponentLeftPayload, QueuedPayload, ScoreUpdatePayload, SubmitAnswerPayload, WebSocketMessage,
};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::state::{DuelResult, DuelRoom, DuelUser, Question, RoomStatus};
use crate::{DuelState, EngineConfig, JoinDebouncer};

/// Errors meaning "you are already in the queue".
const DUPLICATE_JOIN_ERRORS: &[&str] = &["already registered", "already in queue", "already queued"];

/// Errors the server sends for frames it does not handle (such as our
/// keep-alive pings).
const IGNORED_ERRORS: &[&str] = &["unsupported action", "unknown action"];

/// Close reason used when leaving the queue.
pub const LEAVE_QUEUE_REASON: &str = "leave queue";

/// Work the state machine asks its driver to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a message to the server.
    Send(WebSocketMessage),
    /// Open the connection (a no-op if already open).
    Connect,
    /// Close the connection.
    Disconnect { reason: String },
    /// Start (or restart) the round timer for `question_id`.
    ArmRoundTimer { question_id: String, after: Duration },
    CancelRoundTimer,
}

/// Pure duel state machine.
#[derive(Debug)]
pub struct DuelMachine {
    config: EngineConfig,
    state: Arc<DuelState>,
    debouncer: JoinDebouncer,
    /// `start_duel` arrived while disconnected; join once connected.
    pending_join: bool,
    /// `leave_queue` tore the connection down and the reconnect has not
    /// started yet. The teardown statuses still in the inbox belong to it.
    resetting: bool,
}

impl DuelMachine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            debouncer: JoinDebouncer::new(config.join_debounce),
            config,
            state: Arc::new(DuelState::default()),
            pending_join: false,
            resetting: false,
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<DuelState> {
        Arc::clone(&self.state)
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Starts matchmaking as `user`.
    ///
    /// Connects first if needed. Dropped while already searching, queued,
    /// or in a room, and when the previous join went out less than
    /// `join_debounce` ago.
    pub fn start_duel(&mut self, user: DuelUser, now: Instant) -> Vec<Effect> {
        let s = &self.state;
        if s.is_searching || s.is_in_queue {
            debug!(player_id = %user.id, "start_duel ignored: already searching or queued");
            return Vec::new();
        }
        if let Some(room) = &s.room {
            debug!(match_id = %room.id, "start_duel ignored: duel in progress");
            return Vec::new();
        }

        let connected = s.connection.is_connected();
        if connected && !self.debouncer.try_join(now) {
            debug!(player_id = %user.id, "start_duel ignored: join debounced");
            return Vec::new();
        }

        info!(player_id = %user.id, connected, "starting duel");
        let join = JoinQueuePayload {
            player_id: user.id.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
        };
        self.update(|s| {
            s.local_user = Some(user);
            s.is_searching = true;
            s.result = None;
            s.error = None;
        });

        if connected {
            vec![Effect::Send(WebSocketMessage::JoinQueue(join))]
        } else {
            self.pending_join = true;
            vec![Effect::Connect]
        }
    }

    /// Submits an answer for the current question.
    ///
    /// Ignored without a room and question, after an answer was already
    /// given, or once the round timed out.
    pub fn submit_answer(&mut self, answer: String) -> Vec<Effect> {
        let s = &self.state;
        if !s.can_answer() {
            debug!(
                has_question = s.question.is_some(),
                has_answered = s.has_answered,
                timed_out = s.round_timed_out,
                "submit_answer ignored"
            );
            return Vec::new();
        }
        let (Some(room), Some(question), Some(me)) = (&s.room, &s.question, s.my_id()) else {
            return Vec::new();
        };

        let payload = SubmitAnswerPayload {
            match_id: room.id.clone(),
            player_id: me.to_owned(),
            question_id: question.id.clone(),
            answer: answer.clone(),
            round_number: question.round_number,
        };
        info!(
            match_id = %payload.match_id,
            question_id = %payload.question_id,
            round = payload.round_number,
            "answer submitted"
        );
        self.update(|s| {
            s.has_answered = true;
            s.selected_answer = Some(answer);
        });
        vec![
            Effect::CancelRoundTimer,
            Effect::Send(WebSocketMessage::SubmitAnswer(payload)),
        ]
    }

    /// Leaves the queue (or the current duel) by dropping and reopening the
    /// connection. The protocol has no dequeue message.
    pub fn leave_queue(&mut self) -> Vec<Effect> {
        info!("leaving queue");
        self.pending_join = false;
        self.resetting = true;
        self.debouncer.reset();
        self.update(|s| {
            // Until the reconnect reports back, a new `start_duel` must
            // wait for `Connected` instead of sending on the old socket.
            s.connection = ConnectionStatus::Disconnecting;
            s.clear_queue();
            s.clear_room();
            s.error = None;
        });
        vec![
            Effect::CancelRoundTimer,
            Effect::Disconnect {
                reason: LEAVE_QUEUE_REASON.into(),
            },
            Effect::Connect,
        ]
    }

    /// The round timer for `question_id` expired.
    pub fn on_round_timeout(&mut self, question_id: &str) -> Vec<Effect> {
        let s = &self.state;
        let current = s.question.as_ref().is_some_and(|q| q.id == question_id);
        if !current || s.has_answered {
            trace!(question_id, "stale round timer");
            return Vec::new();
        }
        info!(question_id, "round timed out");
        self.update(|s| s.round_timed_out = true);
        Vec::new()
    }

    // -----------------------------------------------------------------------
    // Inbox
    // -----------------------------------------------------------------------

    /// Applies one inbox entry.
    pub fn on_inbound(&mut self, inbound: Inbound, now: Instant) -> Vec<Effect> {
        match inbound {
            Inbound::Status(status) => self.on_status(status, now),
            Inbound::Message(msg) => self.on_message(msg),
            Inbound::ReconnectExhausted { attempts } => {
                warn!(attempts, "giving up on the duel server");
                self.pending_join = false;
                self.resetting = false;
                self.update(|s| {
                    s.clear_queue();
                    s.error = Some(format!(
                        "Lost connection to duel server after {attempts} reconnect attempts"
                    ));
                });
                Vec::new()
            }
        }
    }

    fn on_status(&mut self, status: ConnectionStatus, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        let mut join = None;

        if matches!(status, ConnectionStatus::Connecting | ConnectionStatus::Connected) {
            self.resetting = false;
        }
        match status {
            ConnectionStatus::Connected if self.pending_join => {
                self.pending_join = false;
                if self.debouncer.try_join(now) {
                    join = self.state.local_user.clone();
                } else {
                    debug!("pending join debounced");
                }
            }
            ConnectionStatus::Connected | ConnectionStatus::Connecting => {}
            ConnectionStatus::Disconnected | ConnectionStatus::Disconnecting if self.resetting => {}
            ConnectionStatus::Disconnected | ConnectionStatus::Disconnecting => {
                self.pending_join = false;
            }
            ConnectionStatus::Reconnecting | ConnectionStatus::Error => {}
        }

        let pending = self.pending_join;
        self.update(|s| {
            s.connection = status;
            if !status.is_connected() {
                // The server forgets queue entries with the socket. The
                // room survives so a reconnect can pick the duel back up.
                s.clear_queue();
                s.is_searching = pending;
            } else if join.is_none() && s.is_searching && !s.is_in_queue {
                s.is_searching = false;
            }
        });

        if let Some(user) = join {
            info!(player_id = %user.id, "joining queue");
            effects.push(Effect::Send(WebSocketMessage::JoinQueue(JoinQueuePayload {
                player_id: user.id,
                display_name: user.display_name,
                avatar_url: user.avatar_url,
            })));
        }
        effects
    }

    fn on_message(&mut self, msg: WebSocketMessage) -> Vec<Effect> {
        let action = msg.action();
        trace!(action, "applying message");
        match msg {
            WebSocketMessage::Queued(p) => self.on_queued(p),
            WebSocketMessage::MatchFound(p) => return self.on_match_found(p),
            WebSocketMessage::CurrentQuestion(p) | WebSocketMessage::QuestionReceived(p) => {
                return self.on_question(p.into());
            }
            WebSocketMessage::ScoreUpdate(p) => self.on_score_update(p),
            WebSocketMessage::OpponentAnswer(p) => self.on_opponent_answer(p),
            WebSocketMessage::GameOver(p) | WebSocketMessage::DuelComplete(p) => {
                return self.on_game_over(p);
            }
            WebSocketMessage::OpponentLeft(p) => return self.on_opponent_left(p),
            WebSocketMessage::Error(p) => self.on_error(p.message),
            WebSocketMessage::Ping => return vec![Effect::Send(WebSocketMessage::Pong)],
            WebSocketMessage::Pong => {}
            WebSocketMessage::JoinQueue(_) | WebSocketMessage::SubmitAnswer(_) => {
                debug!(action, "ignoring client-only action from server");
            }
        }
        Vec::new()
    }

    fn on_queued(&mut self, p: QueuedPayload) {
        info!(position = ?p.position, "queued");
        self.pending_join = false;
        self.update(|s| {
            s.is_in_queue = true;
            s.is_searching = false;
            s.queue_position = p.position;
            s.queued_at.get_or_insert_with(SystemTime::now);
            s.error = None;
        });
    }

    fn on_match_found(&mut self, p: MatchFoundPayload) -> Vec<Effect> {
        info!(match_id = %p.match_id, opponent_id = %p.opponent_id, "match found");
        self.pending_join = false;
        self.update(|s| {
            let me = s
                .local_user
                .clone()
                .unwrap_or_else(|| DuelUser::new(p.player_id.clone(), String::new()));
            s.scores.clear();
            s.scores.insert(me.id.clone(), 0);
            s.scores.insert(p.opponent_id.clone(), 0);
            s.room = Some(DuelRoom {
                id: p.match_id,
                player1: me,
                player2: Some(DuelUser {
                    id: p.opponent_id,
                    display_name: p.opponent_name,
                    avatar_url: p.opponent_avatar_url,
                }),
                status: RoomStatus::Matched,
            });
            s.question = None;
            s.current_round = 0;
            s.clear_round();
            s.last_answer_correct = None;
            s.opponent_last_correct = None;
            s.clear_queue();
            s.result = None;
            s.error = None;
        });
        vec![Effect::CancelRoundTimer]
    }

    fn on_question(&mut self, question: Question) -> Vec<Effect> {
        if self.state.room.is_none() {
            warn!(question_id = %question.id, "question received outside a duel");
        }
        debug!(question_id = %question.id, round = question.round_number, "question");

        let after = question
            .time_limit
            .unwrap_or(self.config.default_round_time_limit);
        let question_id = question.id.clone();
        self.update(|s| {
            s.current_round = question.round_number;
            if let Some(room) = s.room.as_mut() {
                room.status = RoomStatus::InProgress;
            }
            s.question = Some(question);
            s.clear_round();
        });

        if after.is_zero() {
            vec![Effect::CancelRoundTimer]
        } else {
            vec![Effect::ArmRoundTimer { question_id, after }]
        }
    }

    fn on_score_update(&mut self, p: ScoreUpdatePayload) {
        let me = self.state.my_id().map(str::to_owned);
        let about_me = p.updated_player_id.is_some() && p.updated_player_id == me;
        debug!(
            updated_player_id = ?p.updated_player_id,
            about_me,
            round = ?p.round_number,
            "score update"
        );

        self.update(|s| {
            s.scores.extend(p.scores);
            if let Some(round) = p.round_number {
                s.current_round = round;
            }
            match (&p.updated_player_id, about_me) {
                (Some(_), true) => {
                    if p.correct.is_some() {
                        s.last_answer_correct = p.correct;
                    }
                }
                (Some(_), false) => {
                    s.opponent_answered = true;
                    if p.correct.is_some() {
                        s.opponent_last_correct = p.correct;
                    }
                }
                (None, _) => {}
            }
        });
    }

    fn on_opponent_answer(&mut self, p: OpponentAnswerPayload) {
        debug!(correct = p.correct, "opponent answered");
        self.update(|s| {
            s.opponent_answered = true;
            s.opponent_last_correct = Some(p.correct);
            if let Some(round) = p.round_number {
                s.current_round = round;
            }
            let opponent = s.room.as_ref().and_then(|r| r.opponent_id()).map(str::to_owned);
            if let (Some(score), Some(opponent)) = (p.score, opponent) {
                s.scores.insert(opponent, score);
            }
        });
    }

    fn on_game_over(&mut self, p: GameOverPayload) -> Vec<Effect> {
        let outcome = DuelResult::outcome_for(p.winner_id.as_deref(), self.state.my_id());
        info!(winner_id = ?p.winner_id, ?outcome, "duel complete");
        self.pending_join = false;
        self.debouncer.reset();
        self.update(|s| {
            if !p.scores.is_empty() {
                s.scores = p.scores;
            }
            s.result = Some(DuelResult {
                winner_id: p.winner_id,
                reason: p.reason,
                scores: s.scores.clone(),
                outcome,
            });
            s.clear_room();
            s.clear_queue();
        });
        vec![Effect::CancelRoundTimer]
    }

    fn on_opponent_left(&mut self, p: OpponentLeftPayload) -> Vec<Effect> {
        info!(reason = ?p.reason, "opponent left");
        self.pending_join = false;
        self.debouncer.reset();
        self.update(|s| {
            s.error = Some(match p.reason {
                Some(reason) if !reason.is_empty() => {
                    format!("Your opponent left the duel: {reason}")
                }
                _ => "Your opponent left the duel".to_owned(),
            });
            s.clear_room();
            s.clear_queue();
        });
        vec![Effect::CancelRoundTimer]
    }

    fn on_error(&mut self, message: String) {
        let lower = message.to_lowercase();
        if DUPLICATE_JOIN_ERRORS.iter().any(|m| lower.contains(m)) {
            debug!(%message, "duplicate join treated as queued");
            self.pending_join = false;
            self.update(|s| {
                s.is_in_queue = true;
                s.is_searching = false;
                s.queued_at.get_or_insert_with(SystemTime::now);
                s.error = None;
            });
        } else if IGNORED_ERRORS.iter().any(|m| lower.contains(m)) {
            debug!(%message, "ignoring benign server error");
        } else {
            warn!(%message, "server error");
            self.pending_join = false;
            self.update(|s| {
                s.is_searching = false;
                s.error = Some(message);
            });
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Applies `f` to a private copy of the snapshot and publishes the copy,
    /// keeping `phase` in sync.
    fn update(&mut self, f: impl FnOnce(&mut DuelState)) {
        let mut next = DuelState::clone(&self.state);
        f(&mut next);
        next.phase = next.derive_phase();
        if next != *self.state {
            self.state = Arc::new(next);
        }
    }
}
