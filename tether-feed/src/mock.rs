//! Scripted subscriber for testing.
//!
//! Lets a test decide, per connect attempt, whether the subscription
//! fails and what the resulting stream delivers.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::{Credentials, Disconnected, EventStream, HotSubscriber, SubscribeError};
use tether_types::{EventEnvelope, SessionId};

/// What one scripted stream does next.
#[derive(Debug, Clone)]
pub enum StreamItem {
    /// Deliver an event.
    Event(EventEnvelope),
    /// Drop the stream with the given reason.
    Disconnect(String),
}

enum ConnectOutcome {
    Stream(Vec<StreamItem>),
    Failure(SubscribeError),
}

/// Scripted subscriber for testing.
///
/// Connect attempts consume scripted outcomes in order; once the script
/// runs out, further attempts fail with a network error. Clones share
/// state.
#[derive(Default)]
pub struct ScriptedSubscriber {
    inner: Arc<Mutex<ScriptedSubscriberInner>>,
}

#[derive(Default)]
struct ScriptedSubscriberInner {
    outcomes: VecDeque<ConnectOutcome>,
    connect_attempts: u32,
}

impl ScriptedSubscriber {
    /// Create a subscriber with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful connect delivering the given items.
    ///
    /// After the items are exhausted the stream stays open and silent.
    pub fn push_stream(&self, items: Vec<StreamItem>) {
        let mut inner = self.inner.lock().unwrap();
        inner.outcomes.push_back(ConnectOutcome::Stream(items));
    }

    /// Script a failed connect.
    pub fn push_failure(&self, error: SubscribeError) {
        let mut inner = self.inner.lock().unwrap();
        inner.outcomes.push_back(ConnectOutcome::Failure(error));
    }

    /// How many connect attempts have been made.
    pub fn connect_attempts(&self) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner.connect_attempts
    }
}

impl Clone for ScriptedSubscriber {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl HotSubscriber for ScriptedSubscriber {
    async fn connect(
        &self,
        _session_id: SessionId,
        _credentials: &Credentials,
    ) -> Result<Box<dyn EventStream>, SubscribeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_attempts += 1;

        match inner.outcomes.pop_front() {
            Some(ConnectOutcome::Stream(items)) => Ok(Box::new(ScriptedStream {
                items: items.into(),
            })),
            Some(ConnectOutcome::Failure(error)) => Err(error),
            None => Err(SubscribeError::Network("no scripted connection".into())),
        }
    }
}

struct ScriptedStream {
    items: VecDeque<StreamItem>,
}

#[async_trait]
impl EventStream for ScriptedStream {
    async fn next_event(&mut self) -> Result<EventEnvelope, Disconnected> {
        match self.items.pop_front() {
            Some(StreamItem::Event(envelope)) => Ok(envelope),
            Some(StreamItem::Disconnect(reason)) => Err(Disconnected(reason)),
            // Open and silent, like a healthy idle channel.
            None => std::future::pending().await,
        }
    }
}
