// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pairing Payload
//!
//! The short-lived signed payload a device presents to join a workspace.
//! Exchanged out-of-band: rendered as a QR code or pasted as a string.
//! Receipt records the device as paired-but-untrusted; trust is a separate
//! explicit user action.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ring::rand::SystemRandom;
use serde::{Deserialize, Serialize};

use super::registry::{DeviceType, PairingError};
use crate::crypto::{Signature, SigningKeyPair, VerifyingKey};

/// Pairing payload validity window (5 minutes).
const PAIRING_EXPIRY_SECONDS: i64 = 300;

/// Serde helpers for fixed-size byte arrays as base64 strings.
mod base64_array_32 {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = BASE64.decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

mod base64_array_64 {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 64], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = BASE64.decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64 bytes"))
    }
}

/// A signed, short-lived pairing payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingPayload {
    /// Joining device's id.
    pub device_id: String,
    /// Human-readable device name.
    pub device_name: String,
    /// Device category.
    pub device_type: DeviceType,
    /// OS/platform string.
    pub platform: String,
    /// Joining device's X25519 public key (key wrapping).
    #[serde(with = "base64_array_32")]
    pub public_key: [u8; 32],
    /// Joining device's Ed25519 public key (payload verification).
    #[serde(with = "base64_array_32")]
    pub signing_key: [u8; 32],
    /// Random one-time token tying the handshake together.
    pub pairing_token: String,
    /// Expiry instant (ISO 8601).
    pub expires_at: DateTime<Utc>,
    /// Transport capabilities the device supports.
    pub capabilities: Vec<String>,
    /// Ed25519 signature over the canonical fields.
    #[serde(with = "base64_array_64")]
    signature: [u8; 64],
}

impl PairingPayload {
    /// Generates a signed payload for this device, valid for 5 minutes.
    pub fn generate(
        signing_keys: &SigningKeyPair,
        device_id: &str,
        device_name: &str,
        device_type: DeviceType,
        platform: &str,
        public_key: [u8; 32],
        capabilities: Vec<String>,
    ) -> Self {
        Self::generate_with_expiry(
            signing_keys,
            device_id,
            device_name,
            device_type,
            platform,
            public_key,
            capabilities,
            Utc::now() + Duration::seconds(PAIRING_EXPIRY_SECONDS),
        )
    }

    /// Generates a payload with an explicit expiry (for testing).
    #[allow(clippy::too_many_arguments)]
    pub fn generate_with_expiry(
        signing_keys: &SigningKeyPair,
        device_id: &str,
        device_name: &str,
        device_type: DeviceType,
        platform: &str,
        public_key: [u8; 32],
        capabilities: Vec<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let rng = SystemRandom::new();
        let token_bytes = ring::rand::generate::<[u8; 32]>(&rng)
            .expect("System RNG should not fail")
            .expose();
        let pairing_token = BASE64.encode(token_bytes);

        let mut payload = PairingPayload {
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            device_type,
            platform: platform.to_string(),
            public_key,
            signing_key: *signing_keys.public_key().as_bytes(),
            pairing_token,
            expires_at,
            capabilities,
            signature: [0u8; 64],
        };
        payload.signature = *signing_keys.sign(&payload.signing_data()).as_bytes();
        payload
    }

    /// Returns true past the expiry instant.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Verifies the embedded signature.
    pub fn verify_signature(&self) -> bool {
        let key = VerifyingKey::from_bytes(self.signing_key);
        key.verify(
            &self.signing_data(),
            &Signature::from_bytes(self.signature),
        )
    }

    /// Serializes to the JSON wire form.
    pub fn to_json(&self) -> Result<String, PairingError> {
        serde_json::to_string(self).map_err(|e| PairingError::InvalidPayload(e.to_string()))
    }

    /// Parses and signature-checks a payload. Expiry is checked separately
    /// at processing time so a stale scan gets a precise error.
    pub fn from_json(json: &str) -> Result<Self, PairingError> {
        let payload: PairingPayload =
            serde_json::from_str(json).map_err(|e| PairingError::InvalidPayload(e.to_string()))?;
        if !payload.verify_signature() {
            return Err(PairingError::InvalidSignature);
        }
        Ok(payload)
    }

    /// Renders the payload as a QR code using Unicode blocks.
    pub fn to_qr_string(&self) -> Result<String, PairingError> {
        use qrcode::render::unicode;
        use qrcode::QrCode;

        let json = self.to_json()?;
        let code = QrCode::new(json.as_bytes())
            .map_err(|e| PairingError::InvalidPayload(e.to_string()))?;
        Ok(code
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build())
    }

    /// Canonical byte string covered by the signature.
    fn signing_data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"WSPAIR:");
        data.extend_from_slice(self.device_id.as_bytes());
        data.push(0);
        data.extend_from_slice(self.device_name.as_bytes());
        data.push(0);
        data.extend_from_slice(self.device_type.as_str().as_bytes());
        data.push(0);
        data.extend_from_slice(self.platform.as_bytes());
        data.push(0);
        data.extend_from_slice(&self.public_key);
        data.extend_from_slice(&self.signing_key);
        data.extend_from_slice(self.pairing_token.as_bytes());
        data.extend_from_slice(&self.expires_at.timestamp().to_be_bytes());
        for capability in &self.capabilities {
            data.extend_from_slice(capability.as_bytes());
            data.push(0);
        }
        data
    }
}
