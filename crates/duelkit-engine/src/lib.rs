//! Duel state machine and engine for duelkit.
//!
//! This crate turns server messages and user intents into a single,
//! always-consistent [`DuelState`] snapshot.
//!
//! # Key types
//!
//! - [`DuelMachine`]: the pure transition core (no I/O, no clocks)
//! - [`DuelEngine`] / [`DuelHandle`]: the single-writer worker and its handle
//! - [`DuelState`]: the published snapshot
//! - [`JoinDebouncer`]: suppresses repeated `join_queue` frames
//! - [`IdentityProvider`]: where the local player's identity comes from
//! - [`EngineConfig`]: debounce window and default round timer

mod config;
mod debounce;
mod engine;
mod error;
mod identity;
mod machine;
mod state;

pub use config::EngineConfig;
pub use debounce::JoinDebouncer;
pub use engine::{DuelEngine, DuelHandle};
pub use error::EngineError;
pub use identity::{Identity, IdentityProvider, StaticIdentity};
pub use machine::{DuelMachine, Effect, LEAVE_QUEUE_REASON};
pub use state::{
    DuelOutcome, DuelPhase, DuelResult, DuelRoom, DuelState, DuelUser, Question, RoomStatus,
};
