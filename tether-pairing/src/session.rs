//! Pairing session state machines.
//!
//! One session per device per attempt. The trusted device holds the Master
//! Key and serves it; the new device requests it. Both sides walk the same
//! state ladder and land in `Confirmed` or `Failed`; there is no resend or
//! retry within an attempt.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::crypto::{EphemeralKeyPair, MasterKey};
use crate::rendezvous::{unix_now_millis, RendezvousTicket, DEFAULT_TICKET_TTL};
use crate::transport::TransportLink;
use crate::PairingError;
use tether_types::{
    DeviceId, KeyExchangeCodec, PairingConfirmation, PairingMessage, PairingRequest,
    PairingResponse, WirePublicKey,
};

/// A device's stable identity.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    /// Stable unique id, assigned at provisioning.
    pub id: DeviceId,
    /// Human-readable name shown to the user on the other device.
    pub name: String,
}

impl DeviceIdentity {
    /// Provision a new identity with a random id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(),
            name: name.into(),
        }
    }
}

/// Tunables for a pairing session.
#[derive(Debug, Clone)]
pub struct PairingConfig {
    /// How long to wait for each peer message.
    pub step_timeout: Duration,
    /// Maximum accepted age of a pairing request's timestamp.
    pub max_request_age: Duration,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
            max_request_age: DEFAULT_TICKET_TTL,
        }
    }
}

impl PairingConfig {
    /// Set the per-step timeout.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Set the maximum accepted request age.
    pub fn with_max_request_age(mut self, age: Duration) -> Self {
        self.max_request_age = age;
        self
    }
}

/// Where a pairing session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    /// Not started.
    Idle,
    /// Trusted side, waiting for the new device's request.
    AwaitingRequest,
    /// New-device side, waiting for the trusted device's response.
    AwaitingResponse,
    /// The transfer key has been derived.
    KeyDerived,
    /// The sealed Master Key has crossed the wire.
    MasterKeyTransferred,
    /// Both sides agree the exchange succeeded.
    Confirmed,
    /// The attempt is dead; a retry needs a fresh session.
    Failed,
}

/// The trusted-device side of one pairing attempt.
pub struct TrustedSession<L> {
    link: L,
    identity: DeviceIdentity,
    config: PairingConfig,
    state: PairingState,
}

impl<L: TransportLink> TrustedSession<L> {
    /// Create a session with the default config.
    pub fn new(link: L, identity: DeviceIdentity) -> Self {
        Self::with_config(link, identity, PairingConfig::default())
    }

    /// Create a session with a custom config.
    pub fn with_config(link: L, identity: DeviceIdentity, config: PairingConfig) -> Self {
        Self {
            link,
            identity,
            config,
            state: PairingState::Idle,
        }
    }

    /// Current session state.
    pub fn state(&self) -> PairingState {
        self.state
    }

    fn set_state(&mut self, state: PairingState) {
        debug!(from = ?self.state, to = ?state, "trusted session transition");
        self.state = state;
    }

    /// Serve one pairing attempt: wait for a request, seal the Master Key
    /// for the requester, and wait for its confirmation.
    pub async fn run(
        &mut self,
        master_key: &MasterKey,
        ticket: &RendezvousTicket,
    ) -> Result<(), PairingError> {
        if ticket.is_expired() {
            self.set_state(PairingState::Failed);
            return Err(PairingError::TicketExpired);
        }

        self.set_state(PairingState::AwaitingRequest);
        let frame = self.recv_step("pairing request").await?;

        // Generated before decoding so failure responses can still carry
        // a well-formed public key.
        let keys = EphemeralKeyPair::generate();
        let public = WirePublicKey(keys.public_bytes());

        let request = match KeyExchangeCodec::decode(&frame) {
            Ok(PairingMessage::Request(req)) => req,
            Ok(_) => {
                warn!("expected pairing request, got another message kind");
                return self
                    .fail_with_response(
                        public,
                        "expected pairing request",
                        PairingError::UnexpectedMessage("pairing request"),
                    )
                    .await;
            }
            Err(e) => {
                let reason = e.to_string();
                return self.fail_with_response(public, &reason, e.into()).await;
            }
        };

        let age_ms = unix_now_millis().saturating_sub(request.timestamp);
        if age_ms > self.config.max_request_age.as_millis() as u64 {
            warn!(age_ms, "rejecting stale pairing request");
            return self
                .fail_with_response(public, "pairing request is stale", PairingError::StaleRequest)
                .await;
        }

        info!(peer = %request.device_id, name = %request.device_name, "pairing request accepted");

        let transfer = match keys.derive_transfer_key(request.public_key.as_bytes(), request.device_id)
        {
            Ok(key) => key,
            Err(e) => {
                let reason = e.to_string();
                return self.fail_with_response(public, &reason, e.into()).await;
            }
        };
        self.set_state(PairingState::KeyDerived);

        let (ciphertext, nonce) = match transfer.seal(master_key) {
            Ok(sealed) => sealed,
            Err(e) => {
                let reason = e.to_string();
                return self.fail_with_response(public, &reason, e.into()).await;
            }
        };

        let response = PairingMessage::Response(PairingResponse {
            device_id: self.identity.id,
            public_key: public,
            encrypted_master_key: Some(ciphertext),
            nonce: Some(nonce.to_vec()),
            success: true,
            error: None,
        });
        self.link.send(&KeyExchangeCodec::encode(&response)?).await?;
        self.set_state(PairingState::MasterKeyTransferred);

        let frame = self.recv_step("pairing confirmation").await?;
        match KeyExchangeCodec::decode(&frame) {
            Ok(PairingMessage::Confirmation(conf)) if conf.success => {
                info!(peer = %conf.device_id, "pairing confirmed");
                self.set_state(PairingState::Confirmed);
                Ok(())
            }
            Ok(PairingMessage::Confirmation(conf)) => {
                let reason = conf.error.unwrap_or_else(|| "pairing rejected".into());
                warn!(peer = %conf.device_id, %reason, "peer reported pairing failure");
                self.set_state(PairingState::Failed);
                Err(PairingError::Rejected(reason))
            }
            Ok(_) => {
                self.set_state(PairingState::Failed);
                Err(PairingError::UnexpectedMessage("pairing confirmation"))
            }
            Err(e) => {
                self.set_state(PairingState::Failed);
                Err(e.into())
            }
        }
    }

    async fn recv_step(&mut self, step: &'static str) -> Result<Vec<u8>, PairingError> {
        match tokio::time::timeout(self.config.step_timeout, self.link.recv()).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(e)) => {
                self.set_state(PairingState::Failed);
                Err(e.into())
            }
            Err(_) => {
                warn!(step, "pairing step timed out");
                self.set_state(PairingState::Failed);
                Err(PairingError::Timeout(step))
            }
        }
    }

    /// Report failure to the peer, then fail the session.
    async fn fail_with_response(
        &mut self,
        public: WirePublicKey,
        reason: &str,
        err: PairingError,
    ) -> Result<(), PairingError> {
        let response = PairingMessage::Response(PairingResponse {
            device_id: self.identity.id,
            public_key: public,
            encrypted_master_key: None,
            nonce: None,
            success: false,
            error: Some(reason.to_string()),
        });
        // Best effort; the session fails either way.
        if let Ok(bytes) = KeyExchangeCodec::encode(&response) {
            let _ = self.link.send(&bytes).await;
        }
        self.set_state(PairingState::Failed);
        Err(err)
    }
}

/// The new-device side of one pairing attempt.
pub struct NewDeviceSession<L> {
    link: L,
    identity: DeviceIdentity,
    config: PairingConfig,
    state: PairingState,
}

impl<L: TransportLink> NewDeviceSession<L> {
    /// Create a session with the default config.
    pub fn new(link: L, identity: DeviceIdentity) -> Self {
        Self::with_config(link, identity, PairingConfig::default())
    }

    /// Create a session with a custom config.
    pub fn with_config(link: L, identity: DeviceIdentity, config: PairingConfig) -> Self {
        Self {
            link,
            identity,
            config,
            state: PairingState::Idle,
        }
    }

    /// Current session state.
    pub fn state(&self) -> PairingState {
        self.state
    }

    fn set_state(&mut self, state: PairingState) {
        debug!(from = ?self.state, to = ?state, "new-device session transition");
        self.state = state;
    }

    /// Run one pairing attempt and return the recovered Master Key.
    ///
    /// On any failure the session emits a `success=false` confirmation,
    /// lands in `Failed`, and returns no key material.
    pub async fn run(&mut self, ticket: &RendezvousTicket) -> Result<MasterKey, PairingError> {
        if ticket.is_expired() {
            self.set_state(PairingState::Failed);
            return Err(PairingError::TicketExpired);
        }

        let keys = EphemeralKeyPair::generate();
        let request = PairingMessage::Request(PairingRequest {
            device_id: self.identity.id,
            device_name: self.identity.name.clone(),
            public_key: WirePublicKey(keys.public_bytes()),
            timestamp: unix_now_millis(),
        });
        self.link.send(&KeyExchangeCodec::encode(&request)?).await?;
        self.set_state(PairingState::AwaitingResponse);

        let frame = self.recv_step("pairing response").await?;
        let response = match KeyExchangeCodec::decode(&frame) {
            Ok(PairingMessage::Response(resp)) => resp,
            Ok(_) => {
                return self
                    .fail_with_confirmation(
                        "expected pairing response",
                        PairingError::UnexpectedMessage("pairing response"),
                    )
                    .await;
            }
            Err(e) => {
                let reason = e.to_string();
                return self.fail_with_confirmation(&reason, e.into()).await;
            }
        };

        if !response.success {
            let reason = response
                .error
                .unwrap_or_else(|| "pairing rejected".into());
            warn!(peer = %response.device_id, %reason, "trusted device reported failure");
            return self
                .fail_with_confirmation(&reason, PairingError::Rejected(reason.clone()))
                .await;
        }

        // Guaranteed by codec validation for success=true responses.
        let (Some(ciphertext), Some(nonce)) = (response.encrypted_master_key, response.nonce)
        else {
            return self
                .fail_with_confirmation(
                    "response missing key material",
                    PairingError::UnexpectedMessage("sealed master key"),
                )
                .await;
        };

        let transfer = match keys.derive_transfer_key(response.public_key.as_bytes(), self.identity.id)
        {
            Ok(key) => key,
            Err(e) => {
                let reason = e.to_string();
                return self.fail_with_confirmation(&reason, e.into()).await;
            }
        };
        self.set_state(PairingState::KeyDerived);

        let master_key = match transfer.open(&ciphertext, &nonce) {
            Ok(key) => key,
            Err(e) => {
                warn!(peer = %response.device_id, "master key decryption failed");
                return self
                    .fail_with_confirmation("master key decryption failed", e.into())
                    .await;
            }
        };
        self.set_state(PairingState::MasterKeyTransferred);

        let confirmation = PairingMessage::Confirmation(PairingConfirmation {
            device_id: self.identity.id,
            success: true,
            error: None,
        });
        self.link
            .send(&KeyExchangeCodec::encode(&confirmation)?)
            .await?;

        info!(peer = %response.device_id, "pairing confirmed, master key installed");
        self.set_state(PairingState::Confirmed);
        Ok(master_key)
    }

    async fn recv_step(&mut self, step: &'static str) -> Result<Vec<u8>, PairingError> {
        match tokio::time::timeout(self.config.step_timeout, self.link.recv()).await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(e)) => {
                self.set_state(PairingState::Failed);
                Err(e.into())
            }
            Err(_) => {
                warn!(step, "pairing step timed out");
                self.set_state(PairingState::Failed);
                Err(PairingError::Timeout(step))
            }
        }
    }

    /// Report failure to the peer, then fail the session.
    async fn fail_with_confirmation(
        &mut self,
        reason: &str,
        err: PairingError,
    ) -> Result<MasterKey, PairingError> {
        let confirmation = PairingMessage::Confirmation(PairingConfirmation {
            device_id: self.identity.id,
            success: false,
            error: Some(reason.to_string()),
        });
        // Best effort; the session fails either way.
        if let Ok(bytes) = KeyExchangeCodec::encode(&confirmation) {
            let _ = self.link.send(&bytes).await;
        }
        self.set_state(PairingState::Failed);
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelLink, MockLink};
    use crate::CryptoError;

    fn trusted_identity() -> DeviceIdentity {
        DeviceIdentity::new("Living Room Desktop")
    }

    fn new_identity() -> DeviceIdentity {
        DeviceIdentity::new("Phone")
    }

    fn decode_last(link: &MockLink) -> PairingMessage {
        KeyExchangeCodec::decode(&link.last_sent().unwrap()).unwrap()
    }

    // ===========================================
    // Full Handshake
    // ===========================================

    #[tokio::test]
    async fn full_handshake_transfers_the_master_key() {
        let (trusted_link, new_link) = ChannelLink::pair();
        let master_key = MasterKey::generate();
        let ticket = RendezvousTicket::create();

        let mut trusted = TrustedSession::new(trusted_link, trusted_identity());
        let served = {
            let master_key = master_key.clone();
            let ticket = ticket.clone();
            tokio::spawn(async move {
                let result = trusted.run(&master_key, &ticket).await;
                (result, trusted.state())
            })
        };

        let mut new_device = NewDeviceSession::new(new_link, new_identity());
        let received = new_device.run(&ticket).await.unwrap();

        let (result, trusted_state) = served.await.unwrap();
        result.unwrap();

        assert_eq!(received.as_bytes(), master_key.as_bytes());
        assert_eq!(trusted_state, PairingState::Confirmed);
        assert_eq!(new_device.state(), PairingState::Confirmed);
    }

    // ===========================================
    // Failure Propagation
    // ===========================================

    #[tokio::test]
    async fn trusted_failure_propagates_to_confirmation() {
        // Trusted device reports it cannot produce the key; the new device
        // must echo the reason in a failed confirmation and store nothing.
        let link = MockLink::new();
        let trusted_id = DeviceId::new();
        let failure = PairingMessage::Response(PairingResponse {
            device_id: trusted_id,
            public_key: WirePublicKey([1u8; 32]),
            encrypted_master_key: None,
            nonce: None,
            success: false,
            error: Some("master key unavailable".into()),
        });
        link.queue_frame(KeyExchangeCodec::encode(&failure).unwrap());

        let mut session = NewDeviceSession::new(link.clone(), new_identity());
        let result = session.run(&RendezvousTicket::create()).await;

        assert!(matches!(result, Err(PairingError::Rejected(r)) if r == "master key unavailable"));
        assert_eq!(session.state(), PairingState::Failed);

        match decode_last(&link) {
            PairingMessage::Confirmation(conf) => {
                assert!(!conf.success);
                assert_eq!(conf.error.as_deref(), Some("master key unavailable"));
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tampered_ciphertext_yields_failed_confirmation() {
        let (trusted_link, new_link) = ChannelLink::pair();
        let ticket = RendezvousTicket::create();

        // Play the trusted role by hand so a single ciphertext bit can be
        // flipped after sealing.
        let trusted = tokio::spawn(async move {
            let frame = trusted_link.recv().await.unwrap();
            let request = match KeyExchangeCodec::decode(&frame).unwrap() {
                PairingMessage::Request(req) => req,
                other => panic!("expected request, got {other:?}"),
            };

            let keys = EphemeralKeyPair::generate();
            let public = WirePublicKey(keys.public_bytes());
            let transfer = keys
                .derive_transfer_key(request.public_key.as_bytes(), request.device_id)
                .unwrap();
            let (mut ciphertext, nonce) = transfer.seal(&MasterKey::generate()).unwrap();
            ciphertext[0] ^= 0x01; // single bit

            let response = PairingMessage::Response(PairingResponse {
                device_id: DeviceId::new(),
                public_key: public,
                encrypted_master_key: Some(ciphertext),
                nonce: Some(nonce.to_vec()),
                success: true,
                error: None,
            });
            trusted_link
                .send(&KeyExchangeCodec::encode(&response).unwrap())
                .await
                .unwrap();

            let frame = trusted_link.recv().await.unwrap();
            KeyExchangeCodec::decode(&frame).unwrap()
        });

        let mut session = NewDeviceSession::new(new_link, new_identity());
        let result = session.run(&ticket).await;

        assert!(matches!(
            result,
            Err(PairingError::Crypto(CryptoError::DecryptionFailed))
        ));
        assert_eq!(session.state(), PairingState::Failed);

        match trusted.await.unwrap() {
            PairingMessage::Confirmation(conf) => {
                assert!(!conf.success);
                assert_eq!(conf.error.as_deref(), Some("master key decryption failed"));
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_request_is_rejected_with_failure_response() {
        let link = MockLink::new();
        let request = PairingMessage::Request(PairingRequest {
            device_id: DeviceId::new(),
            device_name: "Phone".into(),
            public_key: WirePublicKey([2u8; 32]),
            timestamp: 1, // far in the past
        });
        link.queue_frame(KeyExchangeCodec::encode(&request).unwrap());

        let mut session = TrustedSession::new(link.clone(), trusted_identity());
        let result = session
            .run(&MasterKey::generate(), &RendezvousTicket::create())
            .await;

        assert!(matches!(result, Err(PairingError::StaleRequest)));
        assert_eq!(session.state(), PairingState::Failed);

        match decode_last(&link) {
            PairingMessage::Response(resp) => {
                assert!(!resp.success);
                assert!(resp.encrypted_master_key.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unexpected_message_kind_fails_the_trusted_session() {
        let link = MockLink::new();
        let confirmation = PairingMessage::Confirmation(PairingConfirmation {
            device_id: DeviceId::new(),
            success: true,
            error: None,
        });
        link.queue_frame(KeyExchangeCodec::encode(&confirmation).unwrap());

        let mut session = TrustedSession::new(link.clone(), trusted_identity());
        let result = session
            .run(&MasterKey::generate(), &RendezvousTicket::create())
            .await;

        assert!(matches!(result, Err(PairingError::UnexpectedMessage(_))));
        assert_eq!(session.state(), PairingState::Failed);
    }

    // ===========================================
    // Timeouts and Ticket Expiry
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn trusted_session_times_out_without_a_request() {
        let (trusted_link, _new_link) = ChannelLink::pair();
        let mut session = TrustedSession::new(trusted_link, trusted_identity());

        let result = session
            .run(&MasterKey::generate(), &RendezvousTicket::create())
            .await;

        assert!(matches!(
            result,
            Err(PairingError::Timeout("pairing request"))
        ));
        assert_eq!(session.state(), PairingState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn new_device_times_out_without_a_response() {
        let (_trusted_link, new_link) = ChannelLink::pair();
        let mut session = NewDeviceSession::new(new_link, new_identity());

        let result = session.run(&RendezvousTicket::create()).await;

        assert!(matches!(
            result,
            Err(PairingError::Timeout("pairing response"))
        ));
        assert_eq!(session.state(), PairingState::Failed);
    }

    #[tokio::test]
    async fn expired_ticket_fails_both_roles() {
        let ticket = RendezvousTicket::create_with_ttl(Duration::from_secs(0));

        let mut trusted = TrustedSession::new(MockLink::new(), trusted_identity());
        let result = trusted.run(&MasterKey::generate(), &ticket).await;
        assert!(matches!(result, Err(PairingError::TicketExpired)));
        assert_eq!(trusted.state(), PairingState::Failed);

        let mut new_device = NewDeviceSession::new(MockLink::new(), new_identity());
        let result = new_device.run(&ticket).await;
        assert!(matches!(result, Err(PairingError::TicketExpired)));
        assert_eq!(new_device.state(), PairingState::Failed);
    }

    // ===========================================
    // Request Shape
    // ===========================================

    #[tokio::test]
    async fn request_carries_identity_and_fresh_timestamp() {
        let link = MockLink::new();
        let identity = new_identity();
        let mut session = NewDeviceSession::new(link.clone(), identity.clone());

        // Fails for lack of a response; we only inspect the request.
        let _ = session.run(&RendezvousTicket::create()).await;

        match KeyExchangeCodec::decode(&link.sent_frames()[0]).unwrap() {
            PairingMessage::Request(req) => {
                assert_eq!(req.device_id, identity.id);
                assert_eq!(req.device_name, identity.name);
                assert!(req.timestamp > 0);
            }
            other => panic!("expected request, got {other:?}"),
        }
    }
}
