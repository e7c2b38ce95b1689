//! Event envelope shared by the cold and hot delivery paths.

use serde::{Deserialize, Serialize};

use crate::{EventId, SessionId};

/// One session event as carried by both delivery paths.
///
/// The `(session_id, event_id)` pair is the event's identity. The same
/// envelope may arrive twice, once via the history store and once via the
/// live channel; consumers deduplicate on [`EventId`] within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Session this event belongs to
    pub session_id: SessionId,
    /// Unique id within the session
    pub event_id: EventId,
    /// Application payload, opaque to the sync layer
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Create an envelope with a fresh event id.
    pub fn new(session_id: SessionId, payload: serde_json::Value) -> Self {
        Self {
            session_id,
            event_id: EventId::new(),
            payload,
        }
    }
}
