//! # duelkit
//!
//! Client core for real-time, head-to-head quiz duels.
//!
//! duelkit keeps one persistent connection to a duel server, queues the
//! local player for matchmaking, follows the duel round by round, and
//! publishes everything as a single [`DuelState`] snapshot that a UI can
//! render at any time. The UI itself, persistence, and sign-in are left to
//! the host application.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duelkit::prelude::*;
//!
//! # async fn run() -> Result<(), DuelError> {
//! let client = DuelClient::from_config(ClientConfig::from_env()?)?;
//! client.start_duel_as(&StaticIdentity::new("p1", "Ada")).await?;
//!
//! let mut states = client.subscribe();
//! while states.changed().await.is_ok() {
//!     let state = states.borrow_and_update().clone();
//!     println!("{}", state.phase);
//!     if state.can_answer() {
//!         client.submit_answer("42")?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! | crate | role |
//! |---|---|
//! | [`protocol`] | wire messages and the JSON codec |
//! | [`transport`] | the duplex channel to the server |
//! | [`heartbeat`] | keep-alive scheduling |
//! | [`connection`] | connection lifecycle, reconnects, inbound dispatch |
//! | [`engine`] | the duel state machine |

mod client;
mod config;
mod error;

pub use client::{DuelClient, DuelClientBuilder};
pub use config::{ClientConfig, SERVER_URL_ENV};
pub use error::DuelError;

pub use duelkit_connection as connection;
pub use duelkit_engine as engine;
pub use duelkit_heartbeat as heartbeat;
pub use duelkit_protocol as protocol;
pub use duelkit_transport as transport;

pub use duelkit_engine::{DuelPhase, DuelState, DuelUser};

/// Installs a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// For binaries only. Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub mod prelude {
    //! Everything needed to drive a duel.

    pub use crate::{ClientConfig, DuelClient, DuelClientBuilder, DuelError};
    pub use duelkit_connection::{ConnectionConfig, ConnectionStatus, ReconnectPolicy};
    pub use duelkit_engine::{
        DuelOutcome, DuelPhase, DuelResult, DuelRoom, DuelState, DuelUser, EngineConfig,
        Identity, IdentityProvider, Question, StaticIdentity,
    };
    pub use duelkit_heartbeat::HeartbeatConfig;
}
