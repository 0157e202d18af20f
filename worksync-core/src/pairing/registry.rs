// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device Pairing Registry
//!
//! The trust store for a workspace's device set. Pairing records a device
//! as untrusted; trust is granted explicitly and gives the device a wrapped
//! copy of the workspace sync key plus LAN allow-list membership. Removal
//! deletes the record and must be followed by key rotation so the removed
//! device cannot decrypt future envelopes.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::payload::PairingPayload;
use crate::crypto::WrappedKey;

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Pairing error types.
#[derive(Error, Debug)]
pub enum PairingError {
    #[error("Pairing payload expired")]
    Expired,

    #[error("Invalid pairing payload signature")]
    InvalidSignature,

    #[error("Malformed pairing payload: {0}")]
    InvalidPayload(String),

    #[error("Device already paired: {0}")]
    AlreadyPaired(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device not trusted: {0}")]
    NotTrusted(String),

    #[error("Cannot pair a device with our own id")]
    SelfPairing,
}

/// Device category, as reported at pairing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    Desktop,
    Laptop,
    Mobile,
    Tablet,
    Other,
}

impl DeviceType {
    /// Returns the canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Laptop => "laptop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Other => "other",
        }
    }
}

/// A paired device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncDevice {
    /// Unique device id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Device category.
    pub device_type: DeviceType,
    /// OS/platform string.
    pub platform: String,
    /// X25519 public key for key wrapping.
    pub public_key: [u8; 32],
    /// Ed25519 public key for payload/beacon verification.
    pub signing_key: [u8; 32],
    /// Unix timestamp of the last envelope or beacon seen from this device.
    pub last_seen: u64,
    /// Whether the user has explicitly trusted this device.
    pub trusted: bool,
    /// Transport capabilities reported at pairing.
    pub capabilities: Vec<String>,
}

impl SyncDevice {
    /// Returns the device id as a short hex-ish display fingerprint.
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(8)]
    }
}

/// The wrapped sync key handed to a freshly trusted device.
///
/// Produced by the granting device, delivered out-of-band or through a
/// pairing archive, and installed by the receiving device. Also the
/// recovery path for a device that missed a rotation while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustGrant {
    /// Device being granted the key.
    pub device_id: String,
    /// The wrapped workspace sync key.
    pub wrapped_key: WrappedKey,
    /// Unix timestamp of the grant.
    pub granted_at: u64,
}

/// Trust store for all paired devices of a workspace.
///
/// Mutations go through the same single-writer discipline as config
/// mutations; the owning orchestrator serializes access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicePairingRegistry {
    devices: Vec<SyncDevice>,
    /// Device ids admitted to the LAN transport.
    lan_allow_list: BTreeSet<String>,
}

impl DevicePairingRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a device from a pairing payload as paired-but-untrusted.
    ///
    /// The payload must carry a valid signature (checked at parse) and must
    /// not be expired. `own_device_id` guards against scanning our own code.
    pub fn process_payload(
        &mut self,
        payload: &PairingPayload,
        own_device_id: &str,
    ) -> Result<&SyncDevice, PairingError> {
        if payload.is_expired() {
            return Err(PairingError::Expired);
        }
        if !payload.verify_signature() {
            return Err(PairingError::InvalidSignature);
        }
        if payload.device_id == own_device_id {
            return Err(PairingError::SelfPairing);
        }
        if self.find(&payload.device_id).is_some() {
            return Err(PairingError::AlreadyPaired(payload.device_id.clone()));
        }

        self.devices.push(SyncDevice {
            id: payload.device_id.clone(),
            name: payload.device_name.clone(),
            device_type: payload.device_type,
            platform: payload.platform.clone(),
            public_key: payload.public_key,
            signing_key: payload.signing_key,
            last_seen: current_timestamp(),
            trusted: false,
            capabilities: payload.capabilities.clone(),
        });
        Ok(self.devices.last().expect("just pushed"))
    }

    /// Marks a device trusted and admits it to the LAN allow-list.
    ///
    /// The caller wraps the sync key for the returned device and delivers
    /// the resulting [`TrustGrant`].
    pub fn trust_device(&mut self, device_id: &str) -> Result<&SyncDevice, PairingError> {
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.id == device_id)
            .ok_or_else(|| PairingError::DeviceNotFound(device_id.to_string()))?;
        device.trusted = true;
        self.lan_allow_list.insert(device_id.to_string());
        Ok(device)
    }

    /// Removes a device entirely. Returns the removed record.
    ///
    /// The caller must rotate the workspace key afterwards; removal alone
    /// does not revoke what the device already received.
    pub fn remove_device(&mut self, device_id: &str) -> Result<SyncDevice, PairingError> {
        let index = self
            .devices
            .iter()
            .position(|d| d.id == device_id)
            .ok_or_else(|| PairingError::DeviceNotFound(device_id.to_string()))?;
        self.lan_allow_list.remove(device_id);
        Ok(self.devices.remove(index))
    }

    /// Finds a device by id.
    pub fn find(&self, device_id: &str) -> Option<&SyncDevice> {
        self.devices.iter().find(|d| d.id == device_id)
    }

    /// All paired devices.
    pub fn devices(&self) -> &[SyncDevice] {
        &self.devices
    }

    /// Trusted devices as (id, X25519 public key), for key wrapping.
    pub fn trusted_keys(&self) -> Vec<(String, [u8; 32])> {
        self.devices
            .iter()
            .filter(|d| d.trusted)
            .map(|d| (d.id.clone(), d.public_key))
            .collect()
    }

    /// Number of trusted devices.
    pub fn trusted_count(&self) -> usize {
        self.devices.iter().filter(|d| d.trusted).count()
    }

    /// Returns true if the device may use the LAN transport.
    pub fn is_allowed_on_lan(&self, device_id: &str) -> bool {
        self.lan_allow_list.contains(device_id)
    }

    /// The LAN allow-list.
    pub fn lan_allow_list(&self) -> &BTreeSet<String> {
        &self.lan_allow_list
    }

    /// Updates a device's last-seen timestamp.
    pub fn touch(&mut self, device_id: &str, timestamp: u64) {
        if let Some(device) = self.devices.iter_mut().find(|d| d.id == device_id) {
            device.last_seen = device.last_seen.max(timestamp);
        }
    }

    /// Serializes the registry to JSON for storage.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("registry serialization should not fail")
    }

    /// Deserializes a registry from JSON.
    pub fn from_json(json: &str) -> Result<Self, PairingError> {
        serde_json::from_str(json).map_err(|e| PairingError::InvalidPayload(e.to_string()))
    }
}
