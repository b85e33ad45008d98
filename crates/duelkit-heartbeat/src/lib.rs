//! Keep-alive scheduler for duelkit connections.
//!
//! While a connection is up, the client sends a `ping` frame on a fixed
//! interval (20 s by default) so idle proxies and the server do not drop
//! the socket. This crate only decides *when* a beat is due; sending the
//! frame is the connection manager's job.
//!
//! # Lifetime
//!
//! The scheduler is a plain value owned by the connection actor, not a
//! spawned task. Stopping it simply makes [`HeartbeatScheduler::wait_for_beat`]
//! pend forever, so there is no background timer to leak and no beat can
//! race with a send: both run on the actor's single `select!` loop.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* connect, send, disconnect */ }
//!         _ = heartbeat.wait_for_beat() => send_ping().await,
//!     }
//! }
//! ```
//!
//! An `interval` of zero disables heartbeats entirely: `start` becomes a
//! no-op and the scheduler never fires.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the heartbeat scheduler.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Time between beats. Zero disables heartbeats.
    pub interval: Duration,
    /// Upper bound of a random delay added to the *first* beat after
    /// [`HeartbeatScheduler::start`], so clients that reconnect together do
    /// not ping in lockstep.
    pub initial_jitter: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            initial_jitter: Duration::from_millis(500),
        }
    }
}

impl HeartbeatConfig {
    /// Shortest interval accepted. Anything lower is clamped up to this.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// Create a config for a specific interval with no jitter.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            initial_jitter: Duration::ZERO,
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`HeartbeatScheduler::new`].
    /// A non-zero `interval` below [`Self::MIN_INTERVAL`] is raised to it,
    /// and `initial_jitter` is capped at one interval. Jitter under a
    /// microsecond is dropped.
    pub fn validated(mut self) -> Self {
        if !self.interval.is_zero() && self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                "heartbeat interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.initial_jitter > self.interval {
            self.initial_jitter = self.interval;
        }
        if self.initial_jitter < Duration::from_micros(1) {
            self.initial_jitter = Duration::ZERO;
        }
        self
    }

    /// `false` when the interval is zero.
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Decides when the next keep-alive frame is due.
///
/// One scheduler per connection manager. It starts stopped; the manager
/// calls [`start`](Self::start) on entering `Connected` and
/// [`stop`](Self::stop) on any other transition.
#[derive(Debug)]
pub struct HeartbeatScheduler {
    config: HeartbeatConfig,
    /// When the next beat fires. `None` while stopped.
    next_beat: Option<Instant>,
    /// Beats fired since the last `start`.
    beats: u64,
}

impl HeartbeatScheduler {
    /// Create a stopped scheduler from config.
    pub fn new(config: HeartbeatConfig) -> Self {
        let config = config.validated();
        if !config.is_enabled() {
            debug!("heartbeat disabled (interval is zero)");
        }
        Self {
            config,
            next_beat: None,
            beats: 0,
        }
    }

    /// Arms the scheduler. The first beat fires one interval from now,
    /// plus jitter.
    ///
    /// Calling `start` on a running scheduler restarts the interval.
    pub fn start(&mut self) {
        if !self.config.is_enabled() {
            return;
        }
        let max_jitter = self.config.initial_jitter;
        let jitter = if max_jitter.is_zero() {
            Duration::ZERO
        } else {
            rand::rng().random_range(Duration::ZERO..max_jitter)
        };
        self.next_beat = Some(Instant::now() + self.config.interval + jitter);
        self.beats = 0;
        debug!(
            interval_ms = self.config.interval.as_millis() as u64,
            jitter_ms = jitter.as_millis() as u64,
            "heartbeat started"
        );
    }

    /// Disarms the scheduler. Idempotent.
    pub fn stop(&mut self) {
        if self.next_beat.take().is_some() {
            debug!(beats = self.beats, "heartbeat stopped");
        }
    }

    /// Waits until the next beat is due and returns its sequence number
    /// (starting at 1 after each `start`).
    ///
    /// While stopped this future never resolves; inside `tokio::select!`
    /// the other branches keep running. Dropping the future (because
    /// another branch won) loses nothing, as the deadline lives in `self`.
    pub async fn wait_for_beat(&mut self) -> u64 {
        let Some(next) = self.next_beat else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(next).await;

        // Schedule from now rather than from `next`: a late beat should not
        // be followed by a burst of catch-up pings.
        self.next_beat = Some(Instant::now() + self.config.interval);
        self.beats += 1;
        trace!(beat = self.beats, "heartbeat due");
        self.beats
    }

    /// Whether a beat is currently scheduled.
    pub fn is_running(&self) -> bool {
        self.next_beat.is_some()
    }

    /// Beats fired since the last `start`.
    pub fn beats(&self) -> u64 {
        self.beats
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}
