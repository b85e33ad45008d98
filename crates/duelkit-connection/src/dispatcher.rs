//! Routes decoded server frames, status changes, and synthetic errors into
//! a single ordered inbox.
//!
//! Everything the duel engine reacts to arrives through one
//! [`mpsc::UnboundedReceiver<Inbound>`]: server messages in wire order,
//! connection status transitions, and the errors the connection layer
//! fabricates itself (`"Not connected to duel server"`, parse failures).
//! Because there is exactly one queue, a status change can never overtake
//! a frame that arrived before it.

use duelkit_protocol::{DecodeError, WebSocketMessage, decode};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::ConnectionStatus;

/// Text of the synthetic error pushed when a frame cannot be parsed.
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse message";

/// Text of the synthetic error pushed when sending without a transport.
pub const NOT_CONNECTED_MESSAGE: &str = "Not connected to duel server";

/// One entry in the engine's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A server message, or a synthetic `error` produced locally.
    Message(WebSocketMessage),
    /// The connection moved to a new status.
    Status(ConnectionStatus),
    /// Automatic reconnection gave up after this many attempts.
    ReconnectExhausted { attempts: u32 },
}

/// Receiving half of the inbox, consumed by the duel engine.
pub type Inbox = mpsc::UnboundedReceiver<Inbound>;

/// Producer side of the inbox.
///
/// Cheap to clone. Pushing never blocks and never fails: once the engine
/// has gone away, entries are dropped with a trace log.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl Dispatcher {
    /// Creates a dispatcher and the inbox it feeds.
    pub fn new() -> (Self, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Decodes one raw frame and routes the result.
    ///
    /// - A valid message is pushed as-is.
    /// - An unrecognized `action` is logged and dropped. Newer servers
    ///   may send actions this client does not know, and they must not
    ///   disturb duel state.
    /// - Anything else that fails to parse becomes a synthetic
    ///   `error { message: "Failed to parse message" }`.
    pub fn dispatch_frame(&self, frame: &[u8]) {
        match decode(frame) {
            Ok(msg) => {
                trace!(action = msg.action(), "inbound message");
                self.push(Inbound::Message(msg));
            }
            Err(DecodeError::UnrecognizedAction(action)) => {
                debug!(%action, "ignoring unrecognized action");
            }
            Err(e) => {
                warn!(error = %e, action = e.action(), "failed to decode inbound frame");
                self.push_error(PARSE_FAILURE_MESSAGE);
            }
        }
    }

    /// Pushes an already-decoded message.
    pub fn push_message(&self, msg: WebSocketMessage) {
        self.push(Inbound::Message(msg));
    }

    /// Pushes a synthetic `error` message.
    pub fn push_error(&self, message: impl Into<String>) {
        self.push(Inbound::Message(WebSocketMessage::error(message)));
    }

    pub fn push_status(&self, status: ConnectionStatus) {
        self.push(Inbound::Status(status));
    }

    pub fn push_exhausted(&self, attempts: u32) {
        self.push(Inbound::ReconnectExhausted { attempts });
    }

    fn push(&self, inbound: Inbound) {
        if self.tx.send(inbound).is_err() {
            trace!("inbox closed, dropping entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use duelkit_protocol::{ErrorPayload, QueuedPayload};

    use super::*;

    fn drain(inbox: &mut Inbox) -> Vec<Inbound> {
        let mut out = Vec::new();
        while let Ok(entry) = inbox.try_recv() {
            out.push(entry);
        }
        out
    }

    #[test]
    fn test_valid_frame_is_pushed() {
        let (dispatcher, mut inbox) = Dispatcher::new();
        dispatcher.dispatch_frame(br#"{"action":"queued","data":{"position":2}}"#);
        assert_eq!(
            drain(&mut inbox),
            vec![Inbound::Message(WebSocketMessage::Queued(QueuedPayload {
                position: Some(2),
            }))]
        );
    }

    #[test]
    fn test_unrecognized_action_is_dropped() {
        let (dispatcher, mut inbox) = Dispatcher::new();
        dispatcher.dispatch_frame(br#"{"action":"leaderboard","data":{}}"#);
        assert!(drain(&mut inbox).is_empty());
    }

    #[test]
    fn test_garbage_becomes_parse_error() {
        let (dispatcher, mut inbox) = Dispatcher::new();
        dispatcher.dispatch_frame(b"not json at all");
        assert_eq!(
            drain(&mut inbox),
            vec![Inbound::Message(WebSocketMessage::Error(ErrorPayload {
                message: PARSE_FAILURE_MESSAGE.into(),
            }))]
        );
    }

    #[test]
    fn test_malformed_payload_becomes_parse_error() {
        let (dispatcher, mut inbox) = Dispatcher::new();
        dispatcher.dispatch_frame(br#"{"action":"match_found","data":{"match_id":7}}"#);
        let entries = drain(&mut inbox);
        assert_eq!(entries.len(), 1);
        assert!(matches!(
            &entries[0],
            Inbound::Message(WebSocketMessage::Error(e)) if e.message == PARSE_FAILURE_MESSAGE
        ));
    }

    #[test]
    fn test_entries_keep_push_order() {
        let (dispatcher, mut inbox) = Dispatcher::new();
        dispatcher.push_status(ConnectionStatus::Connecting);
        dispatcher.dispatch_frame(br#"{"action":"pong"}"#);
        dispatcher.push_status(ConnectionStatus::Error);
        dispatcher.push_exhausted(5);
        assert_eq!(
            drain(&mut inbox),
            vec![
                Inbound::Status(ConnectionStatus::Connecting),
                Inbound::Message(WebSocketMessage::Pong),
                Inbound::Status(ConnectionStatus::Error),
                Inbound::ReconnectExhausted { attempts: 5 },
            ]
        );
    }

    #[test]
    fn test_push_after_inbox_dropped_is_silent() {
        let (dispatcher, inbox) = Dispatcher::new();
        drop(inbox);
        dispatcher.push_error("nobody listening");
    }
}
