//! Connection lifecycle for duelkit.
//!
//! This crate owns the link to the duel server:
//!
//! 1. **Connection management**: opening and closing the transport,
//!    timeouts, and automatic reconnection with linear backoff
//!    ([`ConnectionManager`], [`ConnectionHandle`])
//! 2. **Keep-alive**: pinging on an interval while connected (via
//!    `duelkit-heartbeat`)
//! 3. **Dispatch**: decoding inbound frames and funnelling them, together
//!    with status changes and synthetic errors, into one ordered inbox
//!    ([`Dispatcher`], [`Inbound`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine Layer (above)      ← reads the inbox, drives the duel state machine
//!     ↕
//! Connection Layer (this crate)  ← owns the transport, reconnects, dispatches
//!     ↕
//! Transport + Protocol (below)   ← raw frames, JSON envelopes
//! ```
//!
//! # Feature Flags
//!
//! - `test-util`: the in-memory [`mock`] transport

mod config;
mod dispatcher;
mod error;
mod manager;
#[cfg(feature = "test-util")]
pub mod mock;
mod status;

pub use config::{ConnectionConfig, ReconnectPolicy};
pub use dispatcher::{
    Dispatcher, Inbound, Inbox, NOT_CONNECTED_MESSAGE, PARSE_FAILURE_MESSAGE,
};
pub use error::ConnectionError;
pub use manager::{ConnectionHandle, ConnectionManager};
pub use status::ConnectionStatus;

pub use duelkit_heartbeat::HeartbeatConfig;
