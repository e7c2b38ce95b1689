//! Feed connection state and reconnect policy.

use std::time::Duration;

/// Where the feed currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// Loading history and opening the first live subscription.
    Connecting,
    /// The live stream is delivering events.
    Live,
    /// The live channel dropped; waiting out backoff before attempt `n`.
    Reconnecting(u32),
    /// The feed was cancelled; the timeline is frozen.
    Disconnected,
    /// The feed gave up (attempt cap reached or auth rejected).
    Failed,
}

impl FeedState {
    /// Whether the feed can still make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FeedState::Disconnected | FeedState::Failed)
    }
}

/// Tunables for a reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How many historical events the cold path fetches.
    pub cold_window: usize,
    /// The backoff time unit; attempt `n` waits `unit * min(2^n, 30)`.
    pub backoff_unit: Duration,
    /// Reconnect attempts before the feed fails.
    pub max_reconnect_attempts: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            cold_window: 100,
            backoff_unit: Duration::from_secs(1),
            max_reconnect_attempts: 10,
        }
    }
}

impl ReconcilerConfig {
    /// Set the cold-fetch window.
    pub fn with_cold_window(mut self, window: usize) -> Self {
        self.cold_window = window;
        self
    }

    /// Set the backoff unit.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Set the reconnect attempt cap.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }
}

/// Delay before reconnect attempt `attempt` (1-based).
///
/// Exponential with a hard cap: `unit * min(2^attempt, 30)`. No jitter, so
/// the sequence for a 1-second unit is exactly 2s, 4s, 8s, 16s, 30s, 30s...
pub fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt)
        .map(|f| f.min(30))
        .unwrap_or(30);
    unit * factor
}
