//! The duel engine: a single worker task that owns the state machine.
//!
//! Three input sources feed it: user intents (through [`DuelHandle`]),
//! the connection inbox, and the round timer. The worker applies them one
//! at a time, so [`DuelState`] has exactly one writer no matter how many
//! tasks hold a handle.
//!
//! ```text
//!   DuelHandle ──Intent──┐
//!   Inbox ───Inbound─────┼──→ DuelEngine ──→ DuelMachine ──Effect──→ ConnectionHandle
//!   round timer ─────────┘         │
//!                                  └──→ watch<Arc<DuelState>> ──→ presentation layer
//! ```

use std::sync::Arc;

use duelkit_connection::{ConnectionHandle, Inbox};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use crate::{DuelMachine, DuelState, DuelUser, Effect, EngineConfig, EngineError};

/// User intents, in the order they were issued.
#[derive(Debug)]
enum Intent {
    StartDuel(DuelUser),
    SubmitAnswer(String),
    LeaveQueue,
    Shutdown,
}

/// Handle to a running [`DuelEngine`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DuelHandle {
    intents: mpsc::UnboundedSender<Intent>,
    state: watch::Receiver<Arc<DuelState>>,
}

impl DuelHandle {
    /// Queues for a duel as `user`, connecting first if needed.
    pub fn start_duel(&self, user: DuelUser) -> Result<(), EngineError> {
        self.intent(Intent::StartDuel(user))
    }

    /// Answers the current question. Ignored when no answer is possible.
    pub fn submit_answer(&self, answer: impl Into<String>) -> Result<(), EngineError> {
        self.intent(Intent::SubmitAnswer(answer.into()))
    }

    /// Drops out of the queue or the current duel.
    pub fn leave_queue(&self) -> Result<(), EngineError> {
        self.intent(Intent::LeaveQueue)
    }

    /// Stops the engine after it has drained earlier intents.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        self.intent(Intent::Shutdown)
    }

    /// The latest snapshot.
    pub fn state(&self) -> Arc<DuelState> {
        Arc::clone(&self.state.borrow())
    }

    /// A receiver notified on every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<DuelState>> {
        self.state.clone()
    }

    fn intent(&self, intent: Intent) -> Result<(), EngineError> {
        self.intents.send(intent).map_err(|_| EngineError::Stopped)
    }
}

/// Pending round timer.
#[derive(Debug)]
struct RoundTimer {
    deadline: Instant,
    question_id: String,
}

/// The engine worker. Start it with [`DuelEngine::spawn`].
pub struct DuelEngine {
    machine: DuelMachine,
    connection: ConnectionHandle,
    inbox: Inbox,
    intents: mpsc::UnboundedReceiver<Intent>,
    state_tx: watch::Sender<Arc<DuelState>>,
    round_timer: Option<RoundTimer>,
}

impl DuelEngine {
    /// Spawns the engine on the current Tokio runtime.
    ///
    /// `inbox` must be the receiving end of the [`Dispatcher`] the
    /// connection manager was spawned with.
    ///
    /// [`Dispatcher`]: duelkit_connection::Dispatcher
    pub fn spawn(
        config: EngineConfig,
        connection: ConnectionHandle,
        inbox: Inbox,
    ) -> (DuelHandle, JoinHandle<()>) {
        let machine = DuelMachine::new(config);
        let (state_tx, state_rx) = watch::channel(machine.snapshot());
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();

        let engine = Self {
            machine,
            connection,
            inbox,
            intents: intent_rx,
            state_tx,
            round_timer: None,
        };
        let task = tokio::spawn(engine.run());

        let handle = DuelHandle {
            intents: intent_tx,
            state: state_rx,
        };
        (handle, task)
    }

    async fn run(mut self) {
        debug!("duel engine started");

        loop {
            let deadline = self.round_timer.as_ref().map(|t| t.deadline);
            let effects = tokio::select! {
                intent = self.intents.recv() => match intent {
                    Some(Intent::StartDuel(user)) => self.machine.start_duel(user, Instant::now()),
                    Some(Intent::SubmitAnswer(answer)) => self.machine.submit_answer(answer),
                    Some(Intent::LeaveQueue) => self.machine.leave_queue(),
                    Some(Intent::Shutdown) | None => break,
                },
                Some(inbound) = self.inbox.recv() => {
                    trace!(?inbound, "inbox");
                    self.machine.on_inbound(inbound, Instant::now())
                }
                _ = sleep_until(deadline) => match self.round_timer.take() {
                    Some(timer) => self.machine.on_round_timeout(&timer.question_id),
                    None => Vec::new(),
                },
            };

            self.execute(effects);
            self.publish();
        }

        debug!("duel engine stopped");
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            let result = match effect {
                Effect::Send(msg) => self.connection.send_message(&msg),
                Effect::Connect => self.connection.connect(),
                Effect::Disconnect { reason } => self.connection.disconnect(reason),
                Effect::ArmRoundTimer { question_id, after } => {
                    debug!(%question_id, after_ms = after.as_millis() as u64, "round timer armed");
                    self.round_timer = Some(RoundTimer {
                        deadline: Instant::now() + after,
                        question_id,
                    });
                    Ok(())
                }
                Effect::CancelRoundTimer => {
                    if let Some(timer) = self.round_timer.take() {
                        trace!(question_id = %timer.question_id, "round timer cancelled");
                    }
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!(error = %e, "connection command failed");
            }
        }
    }

    fn publish(&self) {
        let next = self.machine.snapshot();
        self.state_tx.send_if_modified(|current| {
            if Arc::ptr_eq(current, &next) {
                return false;
            }
            *current = next;
            true
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
