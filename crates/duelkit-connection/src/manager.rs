//! The connection manager: one actor task that owns the transport.
//!
//! All connection state (the open transport, the status, the reconnect
//! counter, the heartbeat) lives inside a single Tokio task. The outside
//! world talks to it through a cheap, cloneable [`ConnectionHandle`].
//! Slow work runs on helper tasks that report back as events:
//!
//! - a **connect task** per attempt, bounded by `connect_timeout`
//! - a **reader task** per open transport, bounded by `read_timeout`
//!
//! ```text
//!   ConnectionHandle ──Command──┐
//!                               ▼
//!   connect task ──Event──→ ConnectionManager ──Inbound──→ Dispatcher inbox
//!   reader task  ──Event──┘     │  ▲
//!                               │  └── heartbeat / reconnect timers
//!                               ▼
//!                           transport
//! ```
//!
//! # Generations
//!
//! Every connect attempt and every explicit disconnect bumps a generation
//! counter. Helper tasks stamp their events with the generation they were
//! started under, and the actor discards events from older generations.
//! A connect that completes after the user already called `disconnect` is
//! closed immediately instead of resurrecting the session.

use std::sync::Arc;

use duelkit_heartbeat::HeartbeatScheduler;
use duelkit_protocol::{WebSocketMessage, encode_text};
use duelkit_transport::{Connection, Connector, TransportError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

use crate::dispatcher::NOT_CONNECTED_MESSAGE;
use crate::{ConnectionConfig, ConnectionError, ConnectionStatus, Dispatcher};

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Requests accepted by the connection actor.
#[derive(Debug)]
enum Command {
    Connect,
    Send(String),
    Disconnect { reason: String },
    Shutdown,
}

/// Handle to a running connection manager.
///
/// Every method is fire-and-forget: it enqueues a command and returns
/// immediately. Outcomes show up as status changes and inbox entries.
/// The only error is [`ConnectionError::Stopped`], once the actor is gone.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ConnectionHandle {
    /// Opens the transport. A no-op while `Connecting` or `Connected`.
    ///
    /// An explicit connect also resets the reconnect counter and cancels
    /// any pending automatic attempt.
    pub fn connect(&self) -> Result<(), ConnectionError> {
        self.command(Command::Connect)
    }

    /// Sends one raw text frame.
    ///
    /// With no open transport the frame is dropped and a synthetic
    /// `"Not connected to duel server"` error is pushed to the inbox.
    pub fn send(&self, frame: impl Into<String>) -> Result<(), ConnectionError> {
        self.command(Command::Send(frame.into()))
    }

    /// Encodes and sends a protocol message.
    pub fn send_message(&self, msg: &WebSocketMessage) -> Result<(), ConnectionError> {
        let text = encode_text(msg)?;
        self.send(text)
    }

    /// Closes the transport with a normal-closure frame and cancels any
    /// pending reconnect. The manager stays alive for a later `connect`.
    pub fn disconnect(&self, reason: impl Into<String>) -> Result<(), ConnectionError> {
        self.command(Command::Disconnect {
            reason: reason.into(),
        })
    }

    /// Closes the transport and stops the actor.
    pub fn shutdown(&self) -> Result<(), ConnectionError> {
        self.command(Command::Shutdown)
    }

    /// The current status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// A receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    fn command(&self, cmd: Command) -> Result<(), ConnectionError> {
        self.commands.send(cmd).map_err(|_| ConnectionError::Stopped)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Reports from helper tasks, stamped with the generation they ran under.
enum Event<T> {
    Connected { generation: u64, conn: T },
    ConnectFailed { generation: u64, error: TransportError },
    Frame { generation: u64, frame: Vec<u8> },
    Closed { generation: u64, error: Option<TransportError> },
}

/// The connection actor. Construct it with [`ConnectionManager::spawn`].
pub struct ConnectionManager<C: Connector> {
    connector: Arc<C>,
    url: String,
    config: ConnectionConfig,
    dispatcher: Dispatcher,

    status: ConnectionStatus,
    status_tx: watch::Sender<ConnectionStatus>,

    conn: Option<Arc<C::Connection>>,
    reader: Option<JoinHandle<()>>,
    connect_task: Option<JoinHandle<()>>,
    generation: u64,

    /// Automatic reconnect attempts since the last successful connect.
    attempts: u32,
    reconnect_at: Option<Instant>,
    heartbeat: HeartbeatScheduler,

    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<Event<C::Connection>>,
    events: mpsc::UnboundedReceiver<Event<C::Connection>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Spawns the actor on the current Tokio runtime.
    ///
    /// The manager starts `Disconnected`; nothing is dialed until
    /// [`ConnectionHandle::connect`] is called. The returned `JoinHandle`
    /// resolves after [`ConnectionHandle::shutdown`] or once every handle
    /// has been dropped.
    pub fn spawn(
        connector: C,
        url: impl Into<String>,
        config: ConnectionConfig,
        dispatcher: Dispatcher,
    ) -> (ConnectionHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let actor = Self {
            connector: Arc::new(connector),
            url: url.into(),
            heartbeat: HeartbeatScheduler::new(config.heartbeat.clone()),
            config,
            dispatcher,
            status: ConnectionStatus::Disconnected,
            status_tx,
            conn: None,
            reader: None,
            connect_task: None,
            generation: 0,
            attempts: 0,
            reconnect_at: None,
            commands: cmd_rx,
            events_tx,
            events: events_rx,
        };
        let task = tokio::spawn(actor.run());

        let handle = ConnectionHandle {
            commands: cmd_tx,
            status: status_rx,
        };
        (handle, task)
    }

    async fn run(mut self) {
        debug!(url = %self.url, "connection manager started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Connect) => self.handle_connect(),
                    Some(Command::Send(text)) => self.handle_send(text).await,
                    Some(Command::Disconnect { reason }) => self.handle_disconnect(&reason).await,
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = self.events.recv() => self.handle_event(event).await,
                _ = self.heartbeat.wait_for_beat() => self.send_heartbeat().await,
                _ = sleep_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    info!(attempt = self.attempts, "reconnecting");
                    self.start_connect();
                }
            }
        }

        self.handle_disconnect("client shut down").await;
        debug!(url = %self.url, "connection manager stopped");
    }

    // -- commands ----------------------------------------------------------

    fn handle_connect(&mut self) {
        if matches!(
            self.status,
            ConnectionStatus::Connected | ConnectionStatus::Connecting
        ) {
            debug!(status = %self.status, "connect ignored");
            return;
        }
        self.attempts = 0;
        self.reconnect_at = None;
        self.start_connect();
    }

    async fn handle_send(&mut self, text: String) {
        let Some(conn) = self.conn.clone() else {
            warn!(status = %self.status, "send without an open transport");
            self.dispatcher.push_error(NOT_CONNECTED_MESSAGE);
            return;
        };

        let after = self.config.write_timeout;
        match time::timeout(after, conn.send(&text)).await {
            Ok(Ok(())) => trace!(conn = %conn.id(), bytes = text.len(), "frame sent"),
            Ok(Err(e)) => self.on_transport_failure(e),
            Err(_) => self.on_transport_failure(TransportError::Timeout {
                operation: "write",
                after,
            }),
        }
    }

    async fn handle_disconnect(&mut self, reason: &str) {
        // Invalidate in-flight connect attempts and reader events.
        self.generation += 1;
        self.attempts = 0;
        self.reconnect_at = None;
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }

        if let Some(conn) = self.release_transport() {
            self.set_status(ConnectionStatus::Disconnecting);
            if let Err(e) = conn.close(reason).await {
                debug!(conn = %conn.id(), error = %e, "close failed");
            }
            info!(conn = %conn.id(), reason, "disconnected");
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    async fn send_heartbeat(&mut self) {
        match encode_text(&WebSocketMessage::Ping) {
            Ok(text) => self.handle_send(text).await,
            Err(e) => warn!(error = %e, "failed to encode heartbeat"),
        }
    }

    // -- events ------------------------------------------------------------

    async fn handle_event(&mut self, event: Event<C::Connection>) {
        match event {
            Event::Connected { generation, conn } => {
                if generation != self.generation {
                    debug!(conn = %conn.id(), "discarding superseded connection");
                    let _ = conn.close("superseded").await;
                    return;
                }
                self.connect_task = None;
                self.on_connected(conn);
            }
            Event::ConnectFailed { generation, error } => {
                if generation != self.generation {
                    return;
                }
                self.connect_task = None;
                warn!(url = %self.url, error = %error, "connect failed");
                self.on_transport_failure(error);
            }
            Event::Frame { generation, frame } => {
                if generation == self.generation {
                    self.dispatcher.dispatch_frame(&frame);
                }
            }
            Event::Closed { generation, error } => {
                if generation != self.generation {
                    return;
                }
                match error {
                    Some(e) => self.on_transport_failure(e),
                    None => {
                        info!("server closed the connection");
                        self.release_transport();
                        self.set_status(ConnectionStatus::Disconnected);
                        self.schedule_reconnect();
                    }
                }
            }
        }
    }

    fn on_connected(&mut self, conn: C::Connection) {
        let conn = Arc::new(conn);
        info!(conn = %conn.id(), url = %self.url, "connected");

        self.attempts = 0;
        self.reader = Some(spawn_reader(
            Arc::clone(&conn),
            self.generation,
            self.config.read_timeout,
            self.events_tx.clone(),
        ));
        self.conn = Some(conn);
        self.set_status(ConnectionStatus::Connected);
        self.heartbeat.start();
    }

    fn on_transport_failure(&mut self, error: TransportError) {
        warn!(error = %error, "transport failure");
        self.release_transport();
        // Readers of the old transport must not report again.
        self.generation += 1;
        self.set_status(ConnectionStatus::Error);
        self.schedule_reconnect();
    }

    /// Schedules the next automatic attempt, or reports exhaustion.
    fn schedule_reconnect(&mut self) {
        let policy = &self.config.reconnect;
        if self.attempts >= policy.max_attempts {
            warn!(attempts = self.attempts, "reconnect attempts exhausted");
            self.set_status(ConnectionStatus::Error);
            self.dispatcher.push_exhausted(self.attempts);
            return;
        }

        self.attempts += 1;
        let delay = policy.delay_for(self.attempts);
        debug!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
        self.reconnect_at = Some(Instant::now() + delay);
        self.set_status(ConnectionStatus::Reconnecting);
    }

    // -- helpers -----------------------------------------------------------

    fn start_connect(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        self.set_status(ConnectionStatus::Connecting);

        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let after = self.config.connect_timeout;
        let events = self.events_tx.clone();

        self.connect_task = Some(tokio::spawn(async move {
            let event = match time::timeout(after, connector.connect(&url)).await {
                Ok(Ok(conn)) => Event::Connected { generation, conn },
                Ok(Err(error)) => Event::ConnectFailed { generation, error },
                Err(_) => Event::ConnectFailed {
                    generation,
                    error: TransportError::Timeout {
                        operation: "connect",
                        after,
                    },
                },
            };
            let _ = events.send(event);
        }));
    }

    /// Stops the heartbeat and reader and hands back the transport, if any.
    fn release_transport(&mut self) -> Option<Arc<C::Connection>> {
        self.heartbeat.stop();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.conn.take()
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        debug!(from = %self.status, to = %status, "connection status");
        self.status = status;
        self.status_tx.send_replace(status);
        self.dispatcher.push_status(status);
    }
}

/// Forwards frames from `conn` until it closes, fails, or goes silent.
fn spawn_reader<T: Connection>(
    conn: Arc<T>,
    generation: u64,
    read_timeout: std::time::Duration,
    events: mpsc::UnboundedSender<Event<T>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match time::timeout(read_timeout, conn.recv()).await {
                Ok(Ok(Some(frame))) => {
                    if events.send(Event::Frame { generation, frame }).is_err() {
                        return;
                    }
                    continue;
                }
                Ok(Ok(None)) => Event::Closed {
                    generation,
                    error: None,
                },
                Ok(Err(e)) => Event::Closed {
                    generation,
                    error: Some(e),
                },
                Err(_) => Event::Closed {
                    generation,
                    error: Some(TransportError::Timeout {
                        operation: "read",
                        after: read_timeout,
                    }),
                },
            };
            let _ = events.send(event);
            return;
        }
    })
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
