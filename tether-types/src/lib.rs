//! # tether-types
//!
//! Wire format types for the Tether device-constellation protocol.
//!
//! This crate provides the foundational types used across all Tether crates:
//! - [`DeviceId`], [`SessionId`], [`EventId`] - Identity types
//! - [`PairingMessage`] and [`KeyExchangeCodec`] - The three-message pairing exchange
//! - [`EventEnvelope`] - One session event, shared by the cold and hot paths
//! - [`ValidationError`] - Wire validation errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod error;
mod ids;
mod messages;

pub use envelope::EventEnvelope;
pub use error::ValidationError;
pub use ids::{DeviceId, EventId, SessionId};
pub use messages::{
    KeyExchangeCodec, PairingConfirmation, PairingMessage, PairingRequest, PairingResponse,
    WirePublicKey,
};
