//! # tether-pairing
//!
//! Device pairing for the Tether constellation.
//!
//! A new device obtains the constellation's Master Key from a device that
//! already holds it, over an untrusted channel, without the key ever
//! crossing the wire in the clear:
//!
//! 1. The trusted device mints a [`RendezvousTicket`] (QR payload) naming
//!    a short-lived channel.
//! 2. Both sides generate ephemeral X25519 key pairs and run the
//!    three-message exchange (`PAIRING_REQUEST` / `PAIRING_RESPONSE` /
//!    `PAIRING_CONFIRMATION`).
//! 3. The Master Key crosses sealed under a ChaCha20-Poly1305 key derived
//!    from the ECDH shared secret via HKDF-SHA256.
//!
//! Every attempt is single-use: ephemeral secrets are zeroized on every
//! exit path and retries always start a fresh handshake.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod crypto;
mod error;
mod rendezvous;
mod session;
mod transport;

pub use crypto::{CryptoError, EphemeralKeyPair, MasterKey, TransferKey, KEY_SIZE, NONCE_SIZE};
pub use error::PairingError;
pub use rendezvous::{RendezvousTicket, DEFAULT_TICKET_TTL};
pub use session::{
    DeviceIdentity, NewDeviceSession, PairingConfig, PairingState, TrustedSession,
};
pub use transport::{ChannelLink, MockLink, TransportError, TransportLink};
