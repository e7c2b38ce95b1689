//! # tether-feed
//!
//! Hot/cold event synchronization for Tether viewers.
//!
//! A viewer reconstructs a complete, ordered, duplicate-free timeline of a
//! session's events by combining two delivery paths:
//!
//! - **cold**: a bounded fetch of recent history from a store
//!   ([`ColdLoader`])
//! - **hot**: a live push subscription ([`HotSubscriber`] /
//!   [`EventStream`])
//!
//! The [`StreamReconciler`] merges the two, deduplicating by event id
//! across the seam, reconnecting the hot path with capped exponential
//! backoff, and publishing its connection state as a [`FeedState`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cold;
mod error;
mod hot;
pub mod mock;
mod reconciler;
mod state;

pub use cold::{ColdLoader, MemoryEventStore};
pub use error::{Disconnected, StorageUnavailable, SubscribeError};
pub use hot::{Credentials, EventStream, HotSubscriber};
pub use reconciler::{FeedHandle, StreamReconciler};
pub use state::{backoff_delay, FeedState, ReconcilerConfig};
