//! Error types for pairing.

use thiserror::Error;

use crate::{CryptoError, TransportError};
use tether_types::ValidationError;

/// Errors that can end a pairing attempt.
///
/// None of these are retryable within the attempt: recovery always means a
/// brand-new handshake with fresh ephemeral keys and a fresh nonce.
#[derive(Debug, Error)]
pub enum PairingError {
    /// A received message failed wire validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Key derivation or AEAD failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The pairing channel failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The peer did not answer within the step timeout
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The rendezvous ticket expired before or during the attempt
    #[error("rendezvous ticket has expired")]
    TicketExpired,

    /// The rendezvous ticket payload could not be decoded
    #[error("invalid rendezvous ticket: {0}")]
    InvalidTicket(String),

    /// The rendezvous ticket uses an unknown format version
    #[error("unsupported ticket version: {0}")]
    UnsupportedTicketVersion(u32),

    /// The pairing request's timestamp is too old
    #[error("pairing request is stale")]
    StaleRequest,

    /// A message of the wrong kind arrived for the current step
    #[error("unexpected message, expected {0}")]
    UnexpectedMessage(&'static str),

    /// The peer reported failure
    #[error("peer rejected pairing: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PairingError::Timeout("pairing response");
        assert_eq!(err.to_string(), "timed out waiting for pairing response");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PairingError>();
    }
}
