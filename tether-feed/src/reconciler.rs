//! Merges the cold and hot delivery paths into one timeline.
//!
//! One spawned task owns all mutation: it fetches history, opens the live
//! subscription, deduplicates by event id across the seam, and publishes
//! its connection state. The caller interacts through a [`FeedHandle`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::backoff_delay;
use crate::{ColdLoader, Credentials, FeedState, HotSubscriber, ReconcilerConfig, SubscribeError};
use tether_types::{EventEnvelope, EventId, SessionId};

/// Builds reconciled feeds.
#[derive(Debug, Clone, Default)]
pub struct StreamReconciler {
    config: ReconcilerConfig,
}

impl StreamReconciler {
    /// Create a reconciler with the default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reconciler with a custom config.
    pub fn with_config(config: ReconcilerConfig) -> Self {
        Self { config }
    }

    /// Start reconciling a session's feed.
    ///
    /// Spawns the single-writer task and returns the handle. Dropping the
    /// handle (or calling [`FeedHandle::cancel`]) stops the task.
    pub fn spawn(
        &self,
        session_id: SessionId,
        credentials: Credentials,
        loader: Arc<dyn ColdLoader>,
        subscriber: Arc<dyn HotSubscriber>,
    ) -> FeedHandle {
        let (state_tx, state_rx) = watch::channel(FeedState::Connecting);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let timeline = Arc::new(Mutex::new(Vec::new()));
        let history = Arc::new(Mutex::new(vec![FeedState::Connecting]));

        let shared = FeedShared {
            timeline: Arc::clone(&timeline),
            history: Arc::clone(&history),
            state_tx,
            event_tx,
        };

        let task = tokio::spawn(run(
            session_id,
            credentials,
            loader,
            subscriber,
            self.config.clone(),
            shared,
            shutdown_rx,
        ));

        FeedHandle {
            state: state_rx,
            events: event_rx,
            timeline,
            history,
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// The caller's view of a running feed.
pub struct FeedHandle {
    state: watch::Receiver<FeedState>,
    events: mpsc::UnboundedReceiver<EventEnvelope>,
    timeline: Arc<Mutex<Vec<EventEnvelope>>>,
    history: Arc<Mutex<Vec<FeedState>>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Current connection state.
    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    /// Every state the feed has been in, in order.
    pub fn state_history(&self) -> Vec<FeedState> {
        self.history.lock().unwrap().clone()
    }

    /// Snapshot of the reconciled timeline.
    pub fn timeline(&self) -> Vec<EventEnvelope> {
        self.timeline.lock().unwrap().clone()
    }

    /// Receive the next reconciled event, in append order.
    ///
    /// Returns `None` once the feed has stopped and the buffer is drained.
    pub async fn next_event(&mut self) -> Option<EventEnvelope> {
        self.events.recv().await
    }

    /// Wait until the published state satisfies the predicate.
    pub async fn wait_for_state(&mut self, f: impl Fn(FeedState) -> bool) -> FeedState {
        let result = self.state.wait_for(|s| f(*s)).await.map(|state| *state);
        match result {
            Ok(state) => state,
            // Task gone; the last published state stands.
            Err(_) => *self.state.borrow(),
        }
    }

    /// Ask the feed to stop. Interrupts backoff sleeps and in-flight awaits.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait for the feed task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

struct FeedShared {
    timeline: Arc<Mutex<Vec<EventEnvelope>>>,
    history: Arc<Mutex<Vec<FeedState>>>,
    state_tx: watch::Sender<FeedState>,
    event_tx: mpsc::UnboundedSender<EventEnvelope>,
}

impl FeedShared {
    fn set_state(&self, state: FeedState) {
        debug!(?state, "feed state change");
        self.history.lock().unwrap().push(state);
        let _ = self.state_tx.send(state);
    }

    fn append(&self, envelope: EventEnvelope) {
        self.timeline.lock().unwrap().push(envelope.clone());
        // Receiver may be gone; the timeline is still authoritative.
        let _ = self.event_tx.send(envelope);
    }
}

async fn run(
    session_id: SessionId,
    credentials: Credentials,
    loader: Arc<dyn ColdLoader>,
    subscriber: Arc<dyn HotSubscriber>,
    config: ReconcilerConfig,
    shared: FeedShared,
    mut shutdown: watch::Receiver<bool>,
) {
    // Cold path first. Failure degrades to live-only.
    let cold = tokio::select! {
        _ = shutdown.changed() => {
            shared.set_state(FeedState::Disconnected);
            return;
        }
        result = loader.fetch_recent(session_id, config.cold_window) => result,
    };
    let cold = match cold {
        Ok(events) => events,
        Err(e) => {
            warn!(%session_id, error = %e, "history fetch failed, continuing live-only");
            Vec::new()
        }
    };

    let mut seen: HashSet<EventId> = HashSet::new();
    for envelope in cold {
        if seen.insert(envelope.event_id) {
            shared.append(envelope);
        }
    }

    let mut attempt: u32 = 0;
    loop {
        let connect = tokio::select! {
            _ = shutdown.changed() => {
                shared.set_state(FeedState::Disconnected);
                return;
            }
            result = subscriber.connect(session_id, &credentials) => result,
        };

        match connect {
            Ok(mut stream) => {
                info!(%session_id, "live subscription established");
                shared.set_state(FeedState::Live);
                attempt = 0;

                loop {
                    let next = tokio::select! {
                        _ = shutdown.changed() => {
                            shared.set_state(FeedState::Disconnected);
                            return;
                        }
                        event = stream.next_event() => event,
                    };
                    match next {
                        Ok(envelope) => {
                            if seen.insert(envelope.event_id) {
                                shared.append(envelope);
                            } else {
                                debug!(event_id = %envelope.event_id, "duplicate suppressed");
                            }
                        }
                        Err(e) => {
                            warn!(%session_id, error = %e, "live stream dropped");
                            break;
                        }
                    }
                }
            }
            Err(SubscribeError::Auth(reason)) => {
                warn!(%session_id, %reason, "subscription rejected, feed failed");
                shared.set_state(FeedState::Failed);
                return;
            }
            Err(SubscribeError::Network(reason)) => {
                debug!(%session_id, %reason, "subscription connect failed");
            }
        }

        attempt += 1;
        if attempt > config.max_reconnect_attempts {
            warn!(%session_id, attempt, "reconnect cap reached, feed failed");
            shared.set_state(FeedState::Failed);
            return;
        }
        shared.set_state(FeedState::Reconnecting(attempt));

        let delay = backoff_delay(config.backoff_unit, attempt);
        tokio::select! {
            _ = shutdown.changed() => {
                shared.set_state(FeedState::Disconnected);
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
