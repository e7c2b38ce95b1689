//! Error types shared across the Tether crates.

use thiserror::Error;

/// Errors produced when decoding or validating a pairing message.
///
/// A validation failure is local and non-retryable; the peer learns about
/// it through a `success=false` Response or Confirmation, never through a
/// resend of the same message.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Payload is not valid JSON or does not match the declared tag's shape
    #[error("malformed pairing message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Payload carries no `type` tag
    #[error("pairing message missing type tag")]
    MissingTag,

    /// Payload's `type` tag names no known message kind
    #[error("unknown pairing message type: {0}")]
    UnknownTag(String),

    /// Field set does not agree with the message's success flag
    #[error("inconsistent pairing message: {0}")]
    Inconsistent(String),
}
