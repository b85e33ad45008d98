//! A scripted in-memory transport for tests.
//!
//! [`MockConnector`] hands out [`MockConnection`]s whose far ends arrive as
//! [`MockServer`]s on a channel, so a test can play the server: push frames
//! to the client, read what the client sent, close or break the link.
//!
//! ```ignore
//! let (connector, mut servers) = MockConnector::new();
//! let (handle, _task) = ConnectionManager::spawn(connector.clone(), "mock://", config, dispatcher);
//! handle.connect()?;
//! let mut server = servers.recv().await.unwrap();
//! server.push(r#"{"action":"queued","data":{}}"#);
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use duelkit_protocol::{WebSocketMessage, decode, encode_text};
use duelkit_transport::{Connection, ConnectionId, Connector, TransportError};
use tokio::sync::{Mutex, mpsc};

/// What the client did on its side of a mock connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Text(String),
    Closed { reason: String },
}

enum ServerFrame {
    Data(Vec<u8>),
    Close,
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    refuse_all: AtomicBool,
    /// Outcomes for upcoming attempts: `false` refuses. Empty means accept.
    upcoming: StdMutex<VecDeque<bool>>,
    attempts: AtomicU32,
    next_id: AtomicU64,
}

/// A [`Connector`] whose behaviour is controlled by the test.
#[derive(Debug, Clone)]
pub struct MockConnector {
    script: Arc<Script>,
    servers: mpsc::UnboundedSender<MockServer>,
}

impl MockConnector {
    /// Creates a connector that accepts every attempt, plus the receiver
    /// on which each accepted connection's server end is delivered.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockServer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Arc::new(Script::default()),
            servers: tx,
        };
        (connector, rx)
    }

    /// Refuse (or stop refusing) every attempt.
    pub fn refuse_all(&self, refuse: bool) {
        self.script.refuse_all.store(refuse, Ordering::SeqCst);
    }

    /// Refuse the next `n` attempts, then accept again.
    pub fn refuse_next(&self, n: usize) {
        let mut upcoming = self.script.upcoming.lock().unwrap_or_else(|e| e.into_inner());
        upcoming.extend(std::iter::repeat_n(false, n));
    }

    /// Connection attempts made so far, accepted or not.
    pub fn attempts(&self) -> u32 {
        self.script.attempts.load(Ordering::SeqCst)
    }

    fn accepts(&self) -> bool {
        if self.script.refuse_all.load(Ordering::SeqCst) {
            return false;
        }
        let mut upcoming = self.script.upcoming.lock().unwrap_or_else(|e| e.into_inner());
        upcoming.pop_front().unwrap_or(true)
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, url: &str) -> Result<MockConnection, TransportError> {
        self.script.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.accepts() {
            return Err(TransportError::ConnectFailed(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("mock refused {url}"),
            )));
        }

        let id = ConnectionId::new(self.script.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        let _ = self.servers.send(MockServer {
            id,
            to_client,
            from_client,
        });
        Ok(MockConnection {
            id,
            incoming: Mutex::new(incoming),
            outgoing,
        })
    }
}

/// Client side of a mock connection.
pub struct MockConnection {
    id: ConnectionId,
    incoming: Mutex<mpsc::UnboundedReceiver<ServerFrame>>,
    outgoing: mpsc::UnboundedSender<ClientFrame>,
}

impl Connection for MockConnection {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        self.outgoing
            .send(ClientFrame::Text(text.to_owned()))
            .map_err(|_| {
                TransportError::SendFailed(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "mock server dropped",
                ))
            })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.incoming.lock().await.recv().await {
            Some(ServerFrame::Data(bytes)) => Ok(Some(bytes)),
            Some(ServerFrame::Close) | None => Ok(None),
            Some(ServerFrame::Fail(reason)) => Err(TransportError::ReceiveFailed(
                io::Error::new(io::ErrorKind::ConnectionReset, reason),
            )),
        }
    }

    async fn close(&self, reason: &str) -> Result<(), TransportError> {
        let _ = self.outgoing.send(ClientFrame::Closed {
            reason: reason.to_owned(),
        });
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Server side of a mock connection. Dropping it closes the connection
/// cleanly from the client's point of view.
#[derive(Debug)]
pub struct MockServer {
    id: ConnectionId,
    to_client: mpsc::UnboundedSender<ServerFrame>,
    from_client: mpsc::UnboundedReceiver<ClientFrame>,
}

impl std::fmt::Debug for ServerFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Data(bytes) => write!(f, "Data({} bytes)", bytes.len()),
            Self::Close => f.write_str("Close"),
            Self::Fail(reason) => write!(f, "Fail({reason})"),
        }
    }
}

impl MockServer {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Delivers a raw frame to the client.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.to_client.send(ServerFrame::Data(frame.into().into_bytes()));
    }

    /// Encodes and delivers a protocol message.
    pub fn push_message(&self, msg: &WebSocketMessage) {
        if let Ok(text) = encode_text(msg) {
            self.push(text);
        }
    }

    /// Closes the connection cleanly.
    pub fn close(&self) {
        let _ = self.to_client.send(ServerFrame::Close);
    }

    /// Breaks the connection with a receive error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.to_client.send(ServerFrame::Fail(reason.into()));
    }

    /// Next thing the client did, or `None` once the client end is gone.
    pub async fn next_frame(&mut self) -> Option<ClientFrame> {
        self.from_client.recv().await
    }

    /// Next message the client sent, skipping heartbeat pings.
    ///
    /// Returns `None` when the client closes or drops the connection, or
    /// sends something that does not decode.
    pub async fn next_message(&mut self) -> Option<WebSocketMessage> {
        loop {
            match self.next_frame().await? {
                ClientFrame::Text(text) => match decode(text.as_bytes()).ok()? {
                    WebSocketMessage::Ping => continue,
                    msg => return Some(msg),
                },
                ClientFrame::Closed { .. } => return None,
            }
        }
    }

    /// Everything the client sent that is already queued, without waiting.
    pub fn drain_sent(&mut self) -> Vec<ClientFrame> {
        let mut out = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            out.push(frame);
        }
        out
    }
}
