//! Rendezvous tickets for bootstrapping a pairing attempt.
//!
//! Before the three-message exchange can run, the two devices need a
//! shared channel. The trusted device mints a short-lived ticket naming
//! that channel, displays it as a QR payload, and the new device scans it.
//! The ticket carries no key material; confidentiality comes entirely from
//! the ECDH exchange that follows.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::PairingError;

/// Default ticket TTL (5 minutes).
pub const DEFAULT_TICKET_TTL: Duration = Duration::from_secs(300);

/// Current ticket format version.
const TICKET_VERSION: u32 = 1;

/// A short-lived pointer to a pairing channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendezvousTicket {
    /// Ticket format version.
    pub version: u32,
    /// Random identifier of the rendezvous channel.
    pub channel_id: [u8; 32],
    /// Unix timestamp (seconds) when the ticket was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) when the ticket expires.
    pub expires_at: u64,
}

impl RendezvousTicket {
    /// Create a ticket with the default 5-minute TTL.
    pub fn create() -> Self {
        Self::create_with_ttl(DEFAULT_TICKET_TTL)
    }

    /// Create a ticket with a custom TTL.
    pub fn create_with_ttl(ttl: Duration) -> Self {
        let mut channel_id = [0u8; 32];
        getrandom::getrandom(&mut channel_id).expect("getrandom failed");

        let now = unix_now_secs();
        Self {
            version: TICKET_VERSION,
            channel_id,
            created_at: now,
            expires_at: now + ttl.as_secs(),
        }
    }

    /// Check if the ticket has expired.
    pub fn is_expired(&self) -> bool {
        unix_now_secs() >= self.expires_at
    }

    /// Encode the ticket as a base64 JSON payload for QR codes.
    pub fn to_qr_payload(&self) -> Result<String, PairingError> {
        let json = serde_json::to_string(self)
            .map_err(|e| PairingError::InvalidTicket(format!("json encode: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }

    /// Decode a ticket from a base64 JSON payload.
    pub fn from_qr_payload(payload: &str) -> Result<Self, PairingError> {
        let json_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| PairingError::InvalidTicket(format!("base64 decode: {}", e)))?;

        let ticket: Self = serde_json::from_slice(&json_bytes)
            .map_err(|e| PairingError::InvalidTicket(format!("json parse: {}", e)))?;

        if ticket.version != TICKET_VERSION {
            return Err(PairingError::UnsupportedTicketVersion(ticket.version));
        }

        Ok(ticket)
    }
}

pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub(crate) fn unix_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
