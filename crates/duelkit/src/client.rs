//! `DuelClient` builder and lifecycle.
//!
//! This is the entry point for embedding duelkit. It wires every layer
//! together: transport → connection manager → dispatcher → duel engine,
//! and hands back one object the presentation layer can drive.

use std::sync::Arc;
use std::time::Duration;

use duelkit_connection::{ConnectionConfig, ConnectionHandle, ConnectionManager, ConnectionStatus, Dispatcher};
use duelkit_engine::{DuelEngine, DuelHandle, DuelState, DuelUser, EngineConfig, IdentityProvider};
use duelkit_transport::{Connector, WebSocketConnector};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::validate_endpoint;
use crate::{ClientConfig, DuelError};

/// Builder for configuring and starting a [`DuelClient`].
///
/// # Example
///
/// ```rust,no_run
/// use duelkit::prelude::*;
///
/// # async fn run() -> Result<(), DuelError> {
/// let client = DuelClient::builder()
///     .endpoint("wss://duels.example.com/ws")
///     .build()?;
/// client.start_duel(DuelUser::new("p1", "Ada"))?;
/// # Ok(())
/// # }
/// ```
pub struct DuelClientBuilder<C = WebSocketConnector> {
    endpoint: Option<String>,
    connection: ConnectionConfig,
    engine: EngineConfig,
    shutdown_timeout: Duration,
    connector: C,
}

impl DuelClientBuilder<WebSocketConnector> {
    /// Creates a builder that dials over WebSocket.
    pub fn new() -> Self {
        Self {
            endpoint: None,
            connection: ConnectionConfig::default(),
            engine: EngineConfig::default(),
            shutdown_timeout: Duration::from_secs(5),
            connector: WebSocketConnector,
        }
    }
}

impl Default for DuelClientBuilder<WebSocketConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> DuelClientBuilder<C> {
    /// Sets the server URL (`ws://` or `wss://`).
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Takes endpoint and all settings from `config`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.endpoint = Some(config.endpoint);
        self.connection = config.connection;
        self.engine = config.engine;
        self.shutdown_timeout = config.shutdown_timeout;
        self
    }

    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connection = config;
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Replaces the transport.
    pub fn connector<C2: Connector>(self, connector: C2) -> DuelClientBuilder<C2> {
        DuelClientBuilder {
            endpoint: self.endpoint,
            connection: self.connection,
            engine: self.engine,
            shutdown_timeout: self.shutdown_timeout,
            connector,
        }
    }

    /// Spawns the connection manager and duel engine on the current Tokio
    /// runtime. Nothing is dialed until [`DuelClient::connect`] or
    /// [`DuelClient::start_duel`].
    ///
    /// # Errors
    /// [`DuelError::Config`] if no valid endpoint was set.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn build(self) -> Result<DuelClient, DuelError> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| DuelError::Config("endpoint not set".into()))?;
        validate_endpoint(&endpoint)?;

        let (dispatcher, inbox) = Dispatcher::new();
        let (connection, connection_task) =
            ConnectionManager::spawn(self.connector, endpoint.clone(), self.connection, dispatcher);
        let (duel, engine_task) = DuelEngine::spawn(self.engine, connection.clone(), inbox);
        tracing::info!(%endpoint, "duel client started");

        Ok(DuelClient {
            connection,
            duel,
            workers: Some(Workers {
                connection: connection_task,
                engine: engine_task,
            }),
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}

struct Workers {
    connection: JoinHandle<()>,
    engine: JoinHandle<()>,
}

/// A running duel client.
///
/// Intent methods (`start_duel`, `submit_answer`, `leave_queue`) return as
/// soon as the intent is queued. Their effects show up in [`state`]
/// snapshots. They only fail after [`shutdown`].
///
/// Dropping the client without calling `shutdown` aborts both workers
/// without a closing handshake.
///
/// [`state`]: Self::state
/// [`shutdown`]: Self::shutdown
pub struct DuelClient {
    connection: ConnectionHandle,
    duel: DuelHandle,
    workers: Option<Workers>,
    shutdown_timeout: Duration,
}

impl DuelClient {
    /// Creates a new builder.
    pub fn builder() -> DuelClientBuilder {
        DuelClientBuilder::new()
    }

    /// Builds a WebSocket client from `config`.
    pub fn from_config(config: ClientConfig) -> Result<Self, DuelError> {
        DuelClientBuilder::new().config(config).build()
    }

    /// Opens the connection ahead of `start_duel`.
    pub fn connect(&self) -> Result<(), DuelError> {
        Ok(self.connection.connect()?)
    }

    /// Queues for a duel as `user`, connecting first if needed.
    pub fn start_duel(&self, user: DuelUser) -> Result<(), DuelError> {
        Ok(self.duel.start_duel(user)?)
    }

    /// Resolves the local identity through `provider`, then queues.
    pub async fn start_duel_as(&self, provider: &impl IdentityProvider) -> Result<(), DuelError> {
        let identity = provider.identity().await?;
        self.start_duel(identity.into())
    }

    /// Answers the current question.
    pub fn submit_answer(&self, answer: impl Into<String>) -> Result<(), DuelError> {
        Ok(self.duel.submit_answer(answer)?)
    }

    /// Leaves the queue or the current duel by resetting the connection.
    pub fn leave_queue(&self) -> Result<(), DuelError> {
        Ok(self.duel.leave_queue()?)
    }

    /// The latest duel snapshot.
    pub fn state(&self) -> Arc<DuelState> {
        self.duel.state()
    }

    /// A receiver notified on every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<DuelState>> {
        self.duel.subscribe()
    }

    /// The connection status as the connection manager sees it right now.
    ///
    /// May run ahead of `state().connection`, which follows the inbox.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Stops the engine, closes the connection, and waits for both workers.
    ///
    /// Workers still running after the shutdown timeout are aborted.
    pub async fn shutdown(mut self) -> Result<(), DuelError> {
        let Some(workers) = self.workers.take() else {
            return Ok(());
        };
        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;

        // Engine first, so it cannot issue commands to a stopped manager.
        let _ = self.duel.shutdown();
        join_or_abort("duel engine", workers.engine, deadline).await;
        let _ = self.connection.shutdown();
        join_or_abort("connection manager", workers.connection, deadline).await;

        tracing::info!("duel client stopped");
        Ok(())
    }
}

impl Drop for DuelClient {
    fn drop(&mut self) {
        if let Some(workers) = self.workers.take() {
            workers.engine.abort();
            workers.connection.abort();
        }
    }
}

async fn join_or_abort(name: &str, task: JoinHandle<()>, deadline: tokio::time::Instant) {
    let abort = task.abort_handle();
    match tokio::time::timeout_at(deadline, task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(worker = name, error = %e, "worker failed"),
        Err(_) => {
            tracing::warn!(worker = name, "worker did not stop in time, aborting");
            abort.abort();
        }
    }
}
