//! Hot path: live event subscription.

use async_trait::async_trait;

use crate::{Disconnected, SubscribeError};
use tether_types::{EventEnvelope, SessionId};

/// Opaque credentials presented when opening a subscription.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token for the live channel.
    pub token: String,
}

impl Credentials {
    /// Create credentials from a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

// Tokens stay out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials([REDACTED])")
    }
}

/// An open live stream of session events.
///
/// `next_event` suspends between deliveries. Dropping the stream releases
/// the underlying channel.
#[async_trait]
pub trait EventStream: Send {
    /// Wait for the next event.
    async fn next_event(&mut self) -> Result<EventEnvelope, Disconnected>;
}

/// Factory for live subscriptions.
///
/// A single-attempt primitive: one `connect` call makes one attempt and
/// never retries internally. Retry policy lives in the reconciler.
#[async_trait]
pub trait HotSubscriber: Send + Sync {
    /// Open a live subscription to a session's events.
    async fn connect(
        &self,
        session_id: SessionId,
        credentials: &Credentials,
    ) -> Result<Box<dyn EventStream>, SubscribeError>;
}
