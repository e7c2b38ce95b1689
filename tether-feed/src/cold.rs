//! Cold path: bounded reads from the session history store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::StorageUnavailable;
use tether_types::{EventEnvelope, SessionId};

/// Read access to a session's event history.
///
/// The store itself is external; this is its read contract. A failed fetch
/// is non-fatal to callers, which degrade to live-only delivery.
#[async_trait]
pub trait ColdLoader: Send + Sync {
    /// Fetch at most `limit` of the most recent events for a session,
    /// oldest first.
    async fn fetch_recent(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<EventEnvelope>, StorageUnavailable>;
}

/// In-memory history store.
///
/// Reference implementation of the read contract plus the external write
/// contract (`append`). Backs the reconciler tests.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    inner: Mutex<MemoryEventStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryEventStoreInner {
    events: HashMap<SessionId, Vec<EventEnvelope>>,
    fail_next_fetch: Option<String>,
}

impl MemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to a session's history.
    pub fn append(&self, envelope: EventEnvelope) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .events
            .entry(envelope.session_id)
            .or_default()
            .push(envelope);
    }

    /// Number of stored events for a session.
    pub fn len(&self, session_id: SessionId) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.events.get(&session_id).map_or(0, Vec::len)
    }

    /// Whether a session has no stored events.
    pub fn is_empty(&self, session_id: SessionId) -> bool {
        self.len(session_id) == 0
    }

    /// Cause the next `fetch_recent` to fail with the given error.
    pub fn fail_next_fetch(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_fetch = Some(error.to_string());
    }
}

#[async_trait]
impl ColdLoader for MemoryEventStore {
    async fn fetch_recent(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<EventEnvelope>, StorageUnavailable> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(StorageUnavailable(error));
        }

        let events = inner.events.get(&session_id).map_or(&[][..], Vec::as_slice);
        let start = events.len().saturating_sub(limit);
        Ok(events[start..].to_vec())
    }
}
