//! Suppresses `join_queue` storms.

use std::time::Duration;

use tokio::time::Instant;

/// Remembers when the last join went out and refuses another inside the
/// window.
///
/// Time is passed in rather than read, so the state machine stays a pure
/// function of its inputs.
#[derive(Debug, Clone)]
pub struct JoinDebouncer {
    window: Duration,
    last_join: Option<Instant>,
}

impl JoinDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_join: None,
        }
    }

    /// Returns `true` and records `now` if a join may be sent.
    pub fn try_join(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_join {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last_join = Some(now);
        true
    }

    /// Forgets the last join, so the next one goes through immediately.
    pub fn reset(&mut self) {
        self.last_join = None;
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
