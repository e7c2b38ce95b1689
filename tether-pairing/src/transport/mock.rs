//! Mock link for testing.
//!
//! Allows queueing incoming frames and capturing sent frames for
//! verification.

use super::{TransportError, TransportLink};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock link for testing.
///
/// Starts connected. Clones share state, so a test can hold one handle
/// while the code under test holds another.
#[derive(Debug)]
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
}

#[derive(Debug)]
struct MockLinkInner {
    connected: bool,
    sent_frames: Vec<Vec<u8>>,
    receive_queue: VecDeque<Vec<u8>>,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
}

impl Default for MockLinkInner {
    fn default() -> Self {
        Self {
            connected: true,
            sent_frames: Vec::new(),
            receive_queue: VecDeque::new(),
            fail_next_send: None,
            fail_next_recv: None,
        }
    }
}

impl MockLink {
    /// Create a new mock link.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockLinkInner::default())),
        }
    }

    /// Queue a frame to be returned by the next `recv()` call.
    pub fn queue_frame(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.receive_queue.push_back(data);
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_frames.clone()
    }

    /// Get the last frame that was sent.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_frames.last().cloned()
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Cause the next recv() to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_recv = Some(error.to_string());
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockLink {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl TransportLink for MockLink {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_frames.push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_recv.take() {
            return Err(TransportError::ReceiveFailed(error));
        }

        inner
            .receive_queue
            .pop_front()
            .ok_or(TransportError::Closed)
    }

    fn is_connected(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_link_captures_sent_frames() {
        let link = MockLink::new();

        link.send(b"frame 1").await.unwrap();
        link.send(b"frame 2").await.unwrap();

        let sent = link.sent_frames();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], b"frame 1");
        assert_eq!(link.last_sent(), Some(b"frame 2".to_vec()));
    }

    #[tokio::test]
    async fn mock_link_returns_queued_frames() {
        let link = MockLink::new();
        link.queue_frame(b"response 1".to_vec());
        link.queue_frame(b"response 2".to_vec());

        assert_eq!(link.recv().await.unwrap(), b"response 1");
        assert_eq!(link.recv().await.unwrap(), b"response 2");
    }

    #[tokio::test]
    async fn empty_queue_surfaces_as_closed() {
        let link = MockLink::new();
        assert!(matches!(link.recv().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn forced_send_failure() {
        let link = MockLink::new();
        link.fail_next_send("buffer full");

        let result = link.send(b"data").await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));

        // Next send should work
        link.send(b"data").await.unwrap();
    }

    #[tokio::test]
    async fn forced_recv_failure() {
        let link = MockLink::new();
        link.queue_frame(b"data".to_vec());
        link.fail_next_recv("timeout");

        let result = link.recv().await;
        assert!(matches!(result, Err(TransportError::ReceiveFailed(_))));

        // Next recv should work (and get the queued frame)
        assert_eq!(link.recv().await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn closed_link_rejects_io() {
        let link = MockLink::new();
        link.close().await.unwrap();

        assert!(!link.is_connected());
        assert!(matches!(
            link.send(b"data").await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let link1 = MockLink::new();
        let link2 = link1.clone();

        link1.send(b"from link1").await.unwrap();
        assert_eq!(link2.sent_frames().len(), 1);
    }
}
