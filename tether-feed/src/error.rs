//! Error types for the event feed.

use thiserror::Error;

/// The history store could not serve a read.
///
/// Non-fatal: the feed degrades to live-only delivery and keeps going.
#[derive(Debug, Error)]
#[error("history store unavailable: {0}")]
pub struct StorageUnavailable(pub String);

/// Opening a live subscription failed.
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// Credentials were rejected. Fatal for the feed; never retried.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The channel could not be reached. Retried with backoff.
    #[error("network error: {0}")]
    Network(String),
}

/// An open live stream dropped.
///
/// Retried with backoff like a failed connect.
#[derive(Debug, Error)]
#[error("live stream disconnected: {0}")]
pub struct Disconnected(pub String);
