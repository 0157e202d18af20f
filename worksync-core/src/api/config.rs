// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration Types
//!
//! Construction-time settings for the engine and the runtime sync
//! settings that can be updated while running.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionAlgorithm, KdfAlgorithm, KeyRotationPolicy};
use crate::pairing::DeviceType;
use crate::sync::conflict::ConflictPolicy;
use crate::transport::TransportKind;

/// Runtime sync settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Whether the interval timer triggers cycles.
    pub auto_sync: bool,
    /// Seconds between automatic cycles.
    pub sync_interval_secs: u64,
    /// In-cycle retry budget for transient transport errors.
    pub max_retries: u32,
    /// Base delay for exponential retry backoff, milliseconds.
    pub retry_base_delay_ms: u64,
    /// Policy for concurrent edits.
    pub conflict_resolution: ConflictPolicy,
    /// Transports enabled for cycles.
    pub transports: Vec<TransportKind>,
    /// Key rotation policy.
    pub key_rotation: KeyRotationPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            auto_sync: true,
            sync_interval_secs: 300,
            max_retries: 3,
            retry_base_delay_ms: 500,
            conflict_resolution: ConflictPolicy::default(),
            transports: vec![TransportKind::Cloud, TransportKind::Lan],
            key_rotation: KeyRotationPolicy::default(),
        }
    }
}

/// Partial update for [`SyncSettings`]; `None` fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSettingsUpdate {
    pub auto_sync: Option<bool>,
    pub sync_interval_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub conflict_resolution: Option<ConflictPolicy>,
    pub transports: Option<Vec<TransportKind>>,
    pub key_rotation: Option<KeyRotationPolicy>,
}

impl SyncSettings {
    /// Applies a partial update in place.
    pub fn apply(&mut self, update: SyncSettingsUpdate) {
        if let Some(auto_sync) = update.auto_sync {
            self.auto_sync = auto_sync;
        }
        if let Some(interval) = update.sync_interval_secs {
            self.sync_interval_secs = interval;
        }
        if let Some(max_retries) = update.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(delay) = update.retry_base_delay_ms {
            self.retry_base_delay_ms = delay;
        }
        if let Some(policy) = update.conflict_resolution {
            self.conflict_resolution = policy;
        }
        if let Some(transports) = update.transports {
            self.transports = transports;
        }
        if let Some(rotation) = update.key_rotation {
            self.key_rotation = rotation;
        }
    }
}

/// Construction-time configuration for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorksyncConfig {
    /// Path to the storage database. `None` for in-memory (testing).
    pub storage_path: Option<PathBuf>,
    /// Owning user id.
    pub user_id: String,
    /// This device's display name.
    pub device_name: String,
    /// This device's category.
    pub device_type: DeviceType,
    /// OS/platform string.
    pub platform: String,
    /// AEAD for envelopes.
    pub encryption_algorithm: EncryptionAlgorithm,
    /// Password KDF for archives and credentials.
    pub kdf: KdfAlgorithm,
    /// Runtime sync settings.
    pub sync: SyncSettings,
}

impl Default for WorksyncConfig {
    fn default() -> Self {
        WorksyncConfig {
            storage_path: None,
            user_id: String::new(),
            device_name: "unnamed-device".to_string(),
            device_type: DeviceType::Desktop,
            platform: std::env::consts::OS.to_string(),
            encryption_algorithm: EncryptionAlgorithm::default(),
            kdf: KdfAlgorithm::default(),
            sync: SyncSettings::default(),
        }
    }
}
