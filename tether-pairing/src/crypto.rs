//! Cryptographic primitives for device pairing.
//!
//! This module provides:
//! - Ephemeral X25519 key pairs, one per pairing attempt
//! - HKDF-SHA256 derivation of the Master-Key transfer key
//! - ChaCha20-Poly1305 sealing of the Master Key in transit
//!
//! # Security Notes
//!
//! - Ephemeral secrets are consumed by a single Diffie-Hellman and zeroized
//!   on drop; they are never reused across attempts
//! - The transfer key is salted with the new device's id so two concurrent
//!   pairings cannot share key material
//! - Nonces are 96-bit and freshly random per attempt; a key is never used
//!   to seal more than one message

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use tether_types::DeviceId;

/// Key size for the Master Key and the transfer key (256 bits).
pub const KEY_SIZE: usize = 32;

/// Nonce size for ChaCha20-Poly1305 (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// HKDF info string binding the transfer key to its purpose.
const TRANSFER_KEY_INFO: &[u8] = b"tether-pairing-master-key-v1";

/// Crypto errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (authentication error).
    #[error("decryption failed: authentication error")]
    DecryptionFailed,

    /// Sealed payload has the wrong shape (bad nonce or plaintext length).
    #[error("invalid sealed payload: {0}")]
    InvalidPayload(String),

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

/// The constellation's long-lived symmetric secret.
///
/// Generated once when the constellation is created and redistributed to
/// each newly paired device. Pairing moves this key; it never mints one.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_SIZE]);

impl MasterKey {
    /// Generate a fresh random Master Key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        Self(bytes)
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

// Intentionally opaque debug to avoid logging secrets
impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// An ephemeral X25519 key pair for one pairing attempt.
///
/// The secret half is consumed by [`EphemeralKeyPair::derive_transfer_key`]
/// and zeroized when dropped, so a key pair cannot outlive its attempt.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a fresh key pair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random();
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public half, for the wire.
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Run ECDH against the peer's ephemeral public key and derive the
    /// transfer key.
    ///
    /// Consumes the key pair: the shared secret exists only long enough to
    /// feed HKDF-SHA256, salted with the new device's id so the key is
    /// bound to this exchange.
    pub fn derive_transfer_key(
        self,
        peer_public: &[u8; 32],
        new_device: DeviceId,
    ) -> Result<TransferKey, CryptoError> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*peer_public));

        let hkdf = Hkdf::<Sha256>::new(Some(new_device.as_bytes()), shared.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        hkdf.expand(TRANSFER_KEY_INFO, &mut key)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

        Ok(TransferKey(key))
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("secret", &"[REDACTED]")
            .field("public", &self.public)
            .finish()
    }
}

/// The symmetric key that seals the Master Key in transit.
///
/// Derived identically on both sides from the ECDH shared secret. Used to
/// seal exactly one message, then dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TransferKey([u8; KEY_SIZE]);

impl TransferKey {
    /// Encrypt the Master Key under a fresh random nonce.
    ///
    /// Returns (ciphertext, nonce). The nonce is never reused: a new
    /// pairing attempt derives a new transfer key and draws a new nonce.
    pub fn seal(&self, master_key: &MasterKey) -> Result<(Vec<u8>, [u8; NONCE_SIZE]), CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes).expect("getrandom failed");
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let ciphertext = cipher
            .encrypt(nonce, master_key.as_bytes().as_slice())
            .map_err(|_| CryptoError::EncryptionFailed("aead encrypt failed".into()))?;

        Ok((ciphertext, nonce_bytes))
    }

    /// Decrypt a sealed Master Key.
    ///
    /// Fails on any tampering of ciphertext or nonce; a failed open never
    /// yields partial key material.
    pub fn open(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<MasterKey, CryptoError> {
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidPayload(format!(
                "nonce must be {NONCE_SIZE} bytes, got {}",
                nonce.len()
            )));
        }
        let nonce = Nonce::from_slice(nonce);

        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        let bytes: [u8; KEY_SIZE] = plaintext.try_into().map_err(|_| {
            CryptoError::InvalidPayload("sealed payload is not a 32-byte key".into())
        })?;

        Ok(MasterKey::from_bytes(bytes))
    }
}

impl std::fmt::Debug for TransferKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransferKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive_pair() -> (TransferKey, TransferKey) {
        let new_device = DeviceId::new();
        let a = EphemeralKeyPair::generate();
        let b = EphemeralKeyPair::generate();
        let a_public = a.public_bytes();
        let b_public = b.public_bytes();

        let key_a = a.derive_transfer_key(&b_public, new_device).unwrap();
        let key_b = b.derive_transfer_key(&a_public, new_device).unwrap();
        (key_a, key_b)
    }

    // ===========================================
    // ECDH / Derivation Tests
    // ===========================================

    #[test]
    fn both_sides_derive_the_same_transfer_key() {
        let (key_a, key_b) = derive_pair();

        // Verify symmetry through behavior: A seals, B opens.
        let master = MasterKey::generate();
        let (ciphertext, nonce) = key_a.seal(&master).unwrap();
        let recovered = key_b.open(&ciphertext, &nonce).unwrap();

        assert_eq!(master.as_bytes(), recovered.as_bytes());
    }

    #[test]
    fn different_device_ids_derive_different_keys() {
        let a = EphemeralKeyPair::generate();
        let b = EphemeralKeyPair::generate();
        let a_public = a.public_bytes();
        let b_public = b.public_bytes();

        let key_1 = a.derive_transfer_key(&b_public, DeviceId::new()).unwrap();
        let key_2 = b.derive_transfer_key(&a_public, DeviceId::new()).unwrap();

        let master = MasterKey::generate();
        let (ciphertext, nonce) = key_1.seal(&master).unwrap();
        assert!(matches!(
            key_2.open(&ciphertext, &nonce),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn fresh_key_pairs_are_distinct() {
        let a = EphemeralKeyPair::generate();
        let b = EphemeralKeyPair::generate();
        assert_ne!(a.public_bytes(), b.public_bytes());
    }

    // ===========================================
    // Seal / Open Tests
    // ===========================================

    #[test]
    fn seal_uses_96_bit_nonces() {
        let (key, _) = derive_pair();
        let (_, nonce) = key.seal(&MasterKey::generate()).unwrap();
        assert_eq!(nonce.len(), 12);
    }

    #[test]
    fn sealing_twice_draws_fresh_nonces() {
        let (key, _) = derive_pair();
        let master = MasterKey::generate();

        let (ct1, nonce1) = key.seal(&master).unwrap();
        let (ct2, nonce2) = key.seal(&master).unwrap();

        assert_ne!(nonce1, nonce2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let (key_a, key_b) = derive_pair();
        let (mut ciphertext, nonce) = key_a.seal(&MasterKey::generate()).unwrap();

        ciphertext[0] ^= 0x01; // single bit

        let result = key_b.open(&ciphertext, &nonce);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn tampered_nonce_fails_to_open() {
        let (key_a, key_b) = derive_pair();
        let (ciphertext, mut nonce) = key_a.seal(&MasterKey::generate()).unwrap();

        nonce[11] ^= 0x01;

        let result = key_b.open(&ciphertext, &nonce);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn wrong_length_nonce_is_rejected() {
        let (key_a, key_b) = derive_pair();
        let (ciphertext, _) = key_a.seal(&MasterKey::generate()).unwrap();

        let result = key_b.open(&ciphertext, &[0u8; 24]);
        assert!(matches!(result, Err(CryptoError::InvalidPayload(_))));
    }

    // ===========================================
    // MasterKey Tests
    // ===========================================

    #[test]
    fn master_keys_are_random() {
        let a = MasterKey::generate();
        let b = MasterKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn master_key_debug_is_redacted() {
        let key = MasterKey::from_bytes([0x42; 32]);
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("66")); // 0x42 = 66
    }

    #[test]
    fn transfer_key_debug_is_redacted() {
        let (key, _) = derive_pair();
        assert!(format!("{:?}", key).contains("REDACTED"));
    }

    #[test]
    fn ephemeral_key_pair_debug_redacts_secret() {
        let pair = EphemeralKeyPair::generate();
        assert!(format!("{:?}", pair).contains("REDACTED"));
    }
}
