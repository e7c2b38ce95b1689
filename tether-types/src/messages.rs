//! Pairing protocol messages.
//!
//! The three-message key exchange travels as JSON with fixed field names,
//! so these types carry explicit serde renames rather than relying on
//! Rust naming conventions.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{DeviceId, ValidationError};

/// All pairing protocol messages.
///
/// Message tag and payload shape are coupled one-to-one: a payload whose
/// fields do not match its declared tag is rejected at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PairingMessage {
    /// Sent by the new device to open the exchange
    #[serde(rename = "PAIRING_REQUEST")]
    Request(PairingRequest),
    /// Sent by the trusted device, carrying the wrapped Master Key
    #[serde(rename = "PAIRING_RESPONSE")]
    Response(PairingResponse),
    /// Final outcome report from the new device
    #[serde(rename = "PAIRING_CONFIRMATION")]
    Confirmation(PairingConfirmation),
}

const KNOWN_TAGS: [&str; 3] = [
    "PAIRING_REQUEST",
    "PAIRING_RESPONSE",
    "PAIRING_CONFIRMATION",
];

impl PairingMessage {
    /// The device id of the sender, present on every variant.
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::Request(m) => m.device_id,
            Self::Response(m) => m.device_id,
            Self::Confirmation(m) => m.device_id,
        }
    }
}

/// Opening message of the exchange, sent by the device joining the
/// constellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingRequest {
    /// Identity of the new device
    pub device_id: DeviceId,
    /// Human-readable name shown on the trusted device
    pub device_name: String,
    /// New device's ephemeral X25519 public key
    pub public_key: WirePublicKey,
    /// Milliseconds since the Unix epoch, used for freshness checks
    pub timestamp: u64,
}

/// Reply from the trusted device.
///
/// On success it carries the Master Key encrypted under the shared
/// transfer key, plus the responder's own ephemeral public key so the
/// new device can derive the same transfer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingResponse {
    /// Identity of the trusted device
    pub device_id: DeviceId,
    /// Trusted device's ephemeral X25519 public key
    pub public_key: WirePublicKey,
    /// AEAD ciphertext of the Master Key, absent on failure
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64_opt")]
    pub encrypted_master_key: Option<Vec<u8>>,
    /// AEAD nonce, absent on failure
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64_opt")]
    pub nonce: Option<Vec<u8>>,
    /// Whether the trusted device produced a wrapped Master Key
    pub success: bool,
    /// Failure description, present exactly when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final message of the exchange, reporting whether the new device
/// recovered the Master Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingConfirmation {
    /// Identity of the new device
    pub device_id: DeviceId,
    /// Whether the Master Key was decrypted and stored
    pub success: bool,
    /// Failure description, present exactly when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A 32-byte X25519 public key, base64 on the wire.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WirePublicKey(pub [u8; 32]);

impl WirePublicKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for WirePublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for WirePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WirePublicKey({})", BASE64.encode(self.0))
    }
}

impl Serialize for WirePublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for WirePublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = BASE64
            .decode(&s)
            .map_err(|e| D::Error::custom(format!("invalid base64 public key: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("public key must be exactly 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// serde helper: `Option<Vec<u8>>` as an optional base64 string.
mod b64_opt {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&BASE64.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let opt = Option::<String>::deserialize(deserializer)?;
        match opt {
            Some(s) => BASE64
                .decode(&s)
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid base64: {e}"))),
            None => Ok(None),
        }
    }
}

/// Stateless encoder/decoder for [`PairingMessage`].
///
/// Decoding is strict: an unrecognized tag, a missing required field, a
/// non-UUID device id, or a field set inconsistent with the success flag
/// all fail with [`ValidationError`] and never yield a partial message.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyExchangeCodec;

impl KeyExchangeCodec {
    /// Encode a message to its JSON wire form.
    pub fn encode(message: &PairingMessage) -> Result<Vec<u8>, ValidationError> {
        Self::validate(message)?;
        serde_json::to_vec(message).map_err(ValidationError::Malformed)
    }

    /// Decode a message from its JSON wire form.
    pub fn decode(bytes: &[u8]) -> Result<PairingMessage, ValidationError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(ValidationError::Malformed)?;

        // Resolve the tag first so unknown tags are reported as such
        // rather than as a generic serde failure.
        let tag = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(ValidationError::MissingTag)?;
        if !KNOWN_TAGS.contains(&tag) {
            return Err(ValidationError::UnknownTag(tag.to_string()));
        }

        let message: PairingMessage =
            serde_json::from_value(value).map_err(ValidationError::Malformed)?;
        Self::validate(&message)?;
        Ok(message)
    }

    /// Check field-set / success-flag consistency.
    pub fn validate(message: &PairingMessage) -> Result<(), ValidationError> {
        match message {
            PairingMessage::Request(req) => {
                if req.device_name.is_empty() {
                    return Err(ValidationError::Inconsistent(
                        "deviceName must not be empty".into(),
                    ));
                }
                Ok(())
            }
            PairingMessage::Response(resp) => {
                if resp.success {
                    if resp.encrypted_master_key.is_none() || resp.nonce.is_none() {
                        return Err(ValidationError::Inconsistent(
                            "successful response missing encryptedMasterKey or nonce".into(),
                        ));
                    }
                } else {
                    if resp.error.is_none() {
                        return Err(ValidationError::Inconsistent(
                            "failed response missing error".into(),
                        ));
                    }
                    if resp.encrypted_master_key.is_some() || resp.nonce.is_some() {
                        return Err(ValidationError::Inconsistent(
                            "failed response must not carry key material".into(),
                        ));
                    }
                }
                Ok(())
            }
            PairingMessage::Confirmation(conf) => {
                if !conf.success && conf.error.is_none() {
                    return Err(ValidationError::Inconsistent(
                        "failed confirmation missing error".into(),
                    ));
                }
                Ok(())
            }
        }
    }
}
