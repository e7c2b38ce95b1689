//! In-memory duplex link for same-process rendezvous.

use super::{TransportError, TransportLink};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};

/// One end of an in-memory duplex channel.
///
/// [`ChannelLink::pair`] returns the two ends; frames sent on one arrive
/// on the other in order. Used for local rendezvous and for exercising the
/// full handshake in tests.
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    open: AtomicBool,
}

impl ChannelLink {
    /// Create a connected pair of links.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        (
            Self {
                tx: tx_a,
                rx: Mutex::new(rx_b),
                open: AtomicBool::new(true),
            },
            Self {
                tx: tx_b,
                rx: Mutex::new(rx_a),
                open: AtomicBool::new(true),
            },
        )
    }
}

impl std::fmt::Debug for ChannelLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelLink")
            .field("open", &self.open.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl TransportLink for ChannelLink {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Relaxed) {
            return Err(TransportError::NotConnected);
        }
        self.tx
            .send(data.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        if !self.open.load(Ordering::Relaxed) {
            return Err(TransportError::NotConnected);
        }
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(TransportError::Closed)
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::Relaxed);
        let mut rx = self.rx.lock().await;
        rx.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_cross_the_pair_in_order() {
        let (a, b) = ChannelLink::pair();

        a.send(b"first").await.unwrap();
        a.send(b"second").await.unwrap();

        assert_eq!(b.recv().await.unwrap(), b"first");
        assert_eq!(b.recv().await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn both_directions_work() {
        let (a, b) = ChannelLink::pair();

        a.send(b"ping").await.unwrap();
        assert_eq!(b.recv().await.unwrap(), b"ping");

        b.send(b"pong").await.unwrap();
        assert_eq!(a.recv().await.unwrap(), b"pong");
    }

    #[tokio::test]
    async fn closed_link_rejects_io() {
        let (a, _b) = ChannelLink::pair();
        a.close().await.unwrap();

        assert!(!a.is_connected());
        assert!(matches!(
            a.send(b"data").await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(a.recv().await, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn dropped_peer_surfaces_as_closed() {
        let (a, b) = ChannelLink::pair();
        drop(b);

        assert!(matches!(a.send(b"data").await, Err(TransportError::Closed)));
        assert!(matches!(a.recv().await, Err(TransportError::Closed)));
    }
}
