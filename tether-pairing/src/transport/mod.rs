//! Transport abstraction for the pairing channel.
//!
//! The link carries opaque byte frames between the two devices. It is
//! untrusted: confidentiality and integrity of the Master Key come solely
//! from the ECDH + AEAD layer above it.

mod channel;
mod mock;

pub use channel::ChannelLink;
pub use mock::MockLink;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The link is not connected.
    #[error("not connected")]
    NotConnected,

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The peer closed the link.
    #[error("connection closed")]
    Closed,
}

/// A bidirectional frame channel between two pairing devices.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait TransportLink: Send + Sync {
    /// Send one frame to the peer.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive the next frame from the peer, suspending until one arrives.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if the link is open.
    fn is_connected(&self) -> bool;

    /// Close the link.
    async fn close(&self) -> Result<(), TransportError>;
}
