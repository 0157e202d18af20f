// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Workspace Key Management
//!
//! Each device holds an X25519 keypair (key wrapping) and an Ed25519 keypair
//! (pairing payloads). One symmetric workspace sync key protects all config
//! envelopes; it is wrapped individually for every trusted device via
//! ECDH + HKDF + AEAD. Rotation generates a fresh sync key, re-wraps it for
//! the trusted set and bumps the epoch carried in every envelope header.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroize;

use super::encryption::{self, EncryptionAlgorithm, SymmetricKey};
use super::kdf::Hkdf;
use super::password_kdf::KdfAlgorithm;
use super::signing::{SigningError, SigningKeyPair};

/// Domain separation for sync-key wrapping.
const KEY_WRAP_INFO: &[u8] = b"Worksync_KeyWrap";

/// Seconds in a day, for rotation interval checks.
const SECONDS_PER_DAY: u64 = 86_400;

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Errors raised while opening a sealed envelope.
///
/// All variants are fatal for the sync cycle that hit them: they indicate a
/// key mismatch, a rollback attempt or tampering, never a transient fault.
#[derive(Error, Debug)]
pub enum DecryptionError {
    #[error("Authentication failed: wrong key or tampered data")]
    AuthenticationFailed,

    #[error("Envelope epoch {envelope} is older than last accepted epoch {floor}")]
    EpochRollback { envelope: u64, floor: u64 },

    #[error("Envelope epoch {envelope} is newer than local key epoch {local}; re-pairing required")]
    StaleLocalKey { envelope: u64, local: u64 },

    #[error("No workspace sync key installed; device is paired but not trusted")]
    NoWorkspaceKey,
}

/// Key management error types.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Signing key error: {0}")]
    Signing(#[from] SigningError),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Key unwrap failed: wrong device key or corrupted wrap")]
    UnwrapFailed,

    #[error("Wrapped key epoch {wrap} does not match workspace epoch {expected}")]
    WrapEpochMismatch { wrap: u64, expected: u64 },

    #[error("No workspace sync key installed")]
    NoWorkspaceKey,
}

/// Per-device X25519 keypair used for sync-key wrapping.
pub struct DeviceKeyPair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl std::fmt::Debug for DeviceKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceKeyPair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl DeviceKeyPair {
    /// Generates a new random keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        DeviceKeyPair { secret, public }
    }

    /// Reconstructs a keypair from stored secret bytes.
    pub fn from_bytes(mut bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();
        let public = X25519PublicKey::from(&secret);
        DeviceKeyPair { secret, public }
    }

    /// Returns the secret bytes for secure storage.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Returns the public key bytes.
    pub fn public_key(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Computes the X25519 shared secret with another device's public key.
    pub fn diffie_hellman(&self, their_public: &[u8; 32]) -> [u8; 32] {
        let their_key = X25519PublicKey::from(*their_public);
        *self.secret.diffie_hellman(&their_key).as_bytes()
    }
}

/// The workspace sync key wrapped for one specific device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WrappedKey {
    /// Device the key is wrapped for.
    pub device_id: String,
    /// X25519 public key of the device that performed the wrap.
    pub wrapped_by: [u8; 32],
    /// Epoch of the sync key inside.
    pub epoch: u64,
    /// AEAD ciphertext of the 32-byte sync key.
    pub ciphertext: Vec<u8>,
    /// Unix timestamp of the wrap.
    pub wrapped_at: u64,
}

/// Key rotation policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyRotationPolicy {
    /// Whether periodic rotation is enabled.
    pub enabled: bool,
    /// Rotation interval in days.
    pub interval_days: u32,
}

impl Default for KeyRotationPolicy {
    fn default() -> Self {
        KeyRotationPolicy {
            enabled: true,
            interval_days: 90,
        }
    }
}

/// Persistable, non-secret key material for a workspace.
///
/// Secrets (device private keys, the sync key itself) live in secure
/// storage; this record carries everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionMaterial {
    /// AEAD used for envelopes.
    pub algorithm: EncryptionAlgorithm,
    /// Password KDF used for archives and credentials at rest.
    pub kdf: KdfAlgorithm,
    /// Current key epoch; bumped on every rotation.
    pub epoch: u64,
    /// Unix timestamp of the last rotation (0 = never rotated).
    pub last_rotation: u64,
    /// Rotation policy.
    pub rotation: KeyRotationPolicy,
    /// This device's X25519 public key.
    pub device_public_key: [u8; 32],
    /// This device's Ed25519 public key.
    pub signing_public_key: [u8; 32],
    /// Sync key wraps per trusted device id.
    pub wrapped_keys: BTreeMap<String, WrappedKey>,
}

/// Manages the workspace sync key, per-device wraps and envelope sealing.
pub struct EncryptionManager {
    device_id: String,
    device_keys: DeviceKeyPair,
    signing_keys: SigningKeyPair,
    /// None while the device is paired but not yet trusted.
    sync_key: Option<SymmetricKey>,
    algorithm: EncryptionAlgorithm,
    kdf: KdfAlgorithm,
    epoch: u64,
    last_rotation: u64,
    rotation: KeyRotationPolicy,
    wrapped_keys: BTreeMap<String, WrappedKey>,
    /// Highest epoch accepted so far; envelopes below this are rejected.
    epoch_floor: u64,
}

impl EncryptionManager {
    /// Creates key material for a brand-new workspace on this device.
    ///
    /// Generates the device keypairs and the initial sync key at epoch 1.
    pub fn new_workspace(device_id: &str) -> Result<Self, KeyError> {
        Ok(EncryptionManager {
            device_id: device_id.to_string(),
            device_keys: DeviceKeyPair::generate(),
            signing_keys: SigningKeyPair::generate()?,
            sync_key: Some(SymmetricKey::generate()),
            algorithm: EncryptionAlgorithm::default(),
            kdf: KdfAlgorithm::default(),
            epoch: 1,
            last_rotation: current_timestamp(),
            rotation: KeyRotationPolicy::default(),
            wrapped_keys: BTreeMap::new(),
            epoch_floor: 1,
        })
    }

    /// Creates key material for a device joining an existing workspace.
    ///
    /// The device has keypairs but no sync key until it is trusted and
    /// receives a wrap.
    pub fn new_joining(device_id: &str) -> Result<Self, KeyError> {
        Ok(EncryptionManager {
            device_id: device_id.to_string(),
            device_keys: DeviceKeyPair::generate(),
            signing_keys: SigningKeyPair::generate()?,
            sync_key: None,
            algorithm: EncryptionAlgorithm::default(),
            kdf: KdfAlgorithm::default(),
            epoch: 0,
            last_rotation: 0,
            rotation: KeyRotationPolicy::default(),
            wrapped_keys: BTreeMap::new(),
            epoch_floor: 0,
        })
    }

    /// Restores a manager from persisted material and secrets.
    pub fn restore(
        device_id: &str,
        material: EncryptionMaterial,
        device_secret: [u8; 32],
        signing_seed: [u8; 32],
        sync_key: Option<[u8; 32]>,
        epoch_floor: u64,
    ) -> Result<Self, KeyError> {
        Ok(EncryptionManager {
            device_id: device_id.to_string(),
            device_keys: DeviceKeyPair::from_bytes(device_secret),
            signing_keys: SigningKeyPair::from_seed(signing_seed)?,
            sync_key: sync_key.map(SymmetricKey::from_bytes),
            algorithm: material.algorithm,
            kdf: material.kdf,
            epoch: material.epoch,
            last_rotation: material.last_rotation,
            rotation: material.rotation,
            wrapped_keys: material.wrapped_keys,
            epoch_floor,
        })
    }

    /// Returns the persistable non-secret material.
    pub fn material(&self) -> EncryptionMaterial {
        EncryptionMaterial {
            algorithm: self.algorithm,
            kdf: self.kdf,
            epoch: self.epoch,
            last_rotation: self.last_rotation,
            rotation: self.rotation.clone(),
            device_public_key: self.device_keys.public_key(),
            signing_public_key: *self.signing_keys.public_key().as_bytes(),
            wrapped_keys: self.wrapped_keys.clone(),
        }
    }

    /// Returns this device's id.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns this device's X25519 public key.
    pub fn device_public_key(&self) -> [u8; 32] {
        self.device_keys.public_key()
    }

    /// Returns this device's X25519 secret bytes for secure storage.
    pub fn device_secret_bytes(&self) -> [u8; 32] {
        self.device_keys.secret_bytes()
    }

    /// Returns this device's signing keypair.
    pub fn signing_keys(&self) -> &SigningKeyPair {
        &self.signing_keys
    }

    /// Returns the sync key bytes for secure storage, if installed.
    pub fn sync_key_bytes(&self) -> Option<[u8; 32]> {
        self.sync_key.as_ref().map(|k| *k.as_bytes())
    }

    /// Returns the current key epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the highest envelope epoch accepted so far.
    pub fn epoch_floor(&self) -> u64 {
        self.epoch_floor
    }

    /// Returns the configured AEAD algorithm.
    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    /// Returns the configured password KDF.
    pub fn kdf(&self) -> KdfAlgorithm {
        self.kdf
    }

    /// Returns the rotation policy.
    pub fn rotation_policy(&self) -> &KeyRotationPolicy {
        &self.rotation
    }

    /// Sets the rotation policy.
    pub fn set_rotation_policy(&mut self, policy: KeyRotationPolicy) {
        self.rotation = policy;
    }

    /// Selects the AEAD and password KDF for this workspace.
    pub fn configure(&mut self, algorithm: EncryptionAlgorithm, kdf: KdfAlgorithm) {
        self.algorithm = algorithm;
        self.kdf = kdf;
    }

    /// Returns the Unix timestamp of the last rotation (0 = never).
    pub fn last_rotation(&self) -> u64 {
        self.last_rotation
    }

    /// Returns true once a sync key is installed.
    pub fn has_sync_key(&self) -> bool {
        self.sync_key.is_some()
    }

    /// Returns true when periodic rotation is enabled and overdue.
    ///
    /// Initial key generation counts as the first rotation, so a fresh
    /// workspace is due one interval after creation.
    pub fn rotation_due(&self, now: u64) -> bool {
        if !self.rotation.enabled || self.last_rotation == 0 {
            return false;
        }
        now >= self.last_rotation + u64::from(self.rotation.interval_days) * SECONDS_PER_DAY
    }

    // === Key wrapping ===

    /// Wraps the sync key for another device.
    ///
    /// ECDH(our secret, their public) -> HKDF -> AEAD over the raw key.
    /// The AAD binds recipient and epoch so a wrap cannot be replayed for a
    /// different device or key generation.
    pub fn wrap_key_for(
        &mut self,
        device_id: &str,
        their_public: &[u8; 32],
    ) -> Result<WrappedKey, KeyError> {
        let sync_key = self.sync_key.as_ref().ok_or(KeyError::NoWorkspaceKey)?;

        let wrap_key = self.derive_wrap_key(their_public);
        let aad = Self::wrap_aad(device_id, self.epoch);

        let ciphertext = encryption::encrypt(&wrap_key, self.algorithm, sync_key.as_bytes(), &aad)
            .map_err(|_| KeyError::EncryptionFailed)?;

        let wrapped = WrappedKey {
            device_id: device_id.to_string(),
            wrapped_by: self.device_keys.public_key(),
            epoch: self.epoch,
            ciphertext,
            wrapped_at: current_timestamp(),
        };
        self.wrapped_keys
            .insert(device_id.to_string(), wrapped.clone());
        Ok(wrapped)
    }

    /// Unwraps a sync key addressed to this device and installs it.
    ///
    /// Called when a trust grant arrives (first trust, or re-pairing after a
    /// rotation happened while this device was offline).
    pub fn install_wrapped_key(&mut self, wrapped: &WrappedKey) -> Result<(), KeyError> {
        let wrap_key = self.derive_wrap_key(&wrapped.wrapped_by);
        let aad = Self::wrap_aad(&wrapped.device_id, wrapped.epoch);

        let mut key_bytes_vec = encryption::decrypt(&wrap_key, &wrapped.ciphertext, &aad)
            .map_err(|_| KeyError::UnwrapFailed)?;
        let key_bytes: [u8; 32] = key_bytes_vec
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::UnwrapFailed)?;
        key_bytes_vec.zeroize();

        self.sync_key = Some(SymmetricKey::from_bytes(key_bytes));
        self.epoch = wrapped.epoch;
        // A grant arrives over an explicitly trusted channel and re-baselines
        // the rollback floor, e.g. when re-pairing after a missed rotation.
        self.epoch_floor = wrapped.epoch;
        Ok(())
    }

    /// Removes the stored wrap for a device. Returns true if one existed.
    pub fn discard_wrap(&mut self, device_id: &str) -> bool {
        self.wrapped_keys.remove(device_id).is_some()
    }

    /// Returns the stored wrap for a device, if any.
    pub fn wrap_for(&self, device_id: &str) -> Option<&WrappedKey> {
        self.wrapped_keys.get(device_id)
    }

    /// Returns the full current wrap set, carried in envelope headers.
    pub fn wraps(&self) -> Vec<WrappedKey> {
        self.wrapped_keys.values().cloned().collect()
    }

    fn derive_wrap_key(&self, their_public: &[u8; 32]) -> SymmetricKey {
        let mut shared = self.device_keys.diffie_hellman(their_public);
        let key_bytes = Hkdf::derive_key(None, &shared, KEY_WRAP_INFO);
        shared.zeroize();
        SymmetricKey::from_bytes(key_bytes)
    }

    fn wrap_aad(device_id: &str, epoch: u64) -> Vec<u8> {
        let mut aad = Vec::with_capacity(device_id.len() + 8);
        aad.extend_from_slice(device_id.as_bytes());
        aad.extend_from_slice(&epoch.to_be_bytes());
        aad
    }

    // === Envelope sealing ===

    /// Seals a plaintext under the workspace sync key.
    ///
    /// `aad` is the serialized cleartext envelope header.
    pub fn seal(&self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
        let sync_key = self.sync_key.as_ref().ok_or(KeyError::NoWorkspaceKey)?;
        encryption::encrypt(sync_key, self.algorithm, plaintext, aad)
            .map_err(|_| KeyError::EncryptionFailed)
    }

    /// Opens a sealed envelope body, enforcing epoch monotonicity.
    ///
    /// Rejects envelopes from an epoch older than the highest already
    /// accepted (rollback) and envelopes from a newer epoch than the local
    /// key (this device missed a rotation and must re-validate trust).
    pub fn open(
        &mut self,
        envelope_epoch: u64,
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, DecryptionError> {
        let sync_key = self.sync_key.as_ref().ok_or(DecryptionError::NoWorkspaceKey)?;

        if envelope_epoch < self.epoch_floor {
            return Err(DecryptionError::EpochRollback {
                envelope: envelope_epoch,
                floor: self.epoch_floor,
            });
        }
        if envelope_epoch > self.epoch {
            return Err(DecryptionError::StaleLocalKey {
                envelope: envelope_epoch,
                local: self.epoch,
            });
        }

        let plaintext = encryption::decrypt(sync_key, ciphertext, aad)
            .map_err(|_| DecryptionError::AuthenticationFailed)?;

        self.epoch_floor = self.epoch_floor.max(envelope_epoch);
        Ok(plaintext)
    }

    // === Rotation ===

    /// Rotates the workspace sync key.
    ///
    /// Generates a fresh key, re-wraps it for every device in `trusted`
    /// (id, X25519 public key), bumps the epoch and records the rotation
    /// time. Devices absent from `trusted` keep no wrap and cannot decrypt
    /// anything sealed after this call.
    pub fn rotate(&mut self, trusted: &[(String, [u8; 32])]) -> Result<u64, KeyError> {
        if self.sync_key.is_none() {
            return Err(KeyError::NoWorkspaceKey);
        }

        self.sync_key = Some(SymmetricKey::generate());
        self.epoch += 1;
        self.epoch_floor = self.epoch_floor.max(self.epoch);
        self.last_rotation = current_timestamp();
        self.wrapped_keys.clear();

        for (device_id, public_key) in trusted {
            self.wrap_key_for(device_id, public_key)?;
        }

        tracing::info!(epoch = self.epoch, devices = trusted.len(), "rotated workspace sync key");
        Ok(self.epoch)
    }
}
