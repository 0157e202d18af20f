// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Workspace Configuration Model
//!
//! The root aggregate synced between devices: preferences, app and plugin
//! settings, keybindings, UI state, sync settings and notification rules,
//! organized as top-level sections of JSON trees. Leaf writes are stamped
//! with per-path timestamps so the merge policies can resolve at leaf
//! granularity.
//!
//! Serialized snapshots carry a format version; older versions run through
//! a migration step, newer versions are rejected.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::sync::clock::VectorClock;

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

/// Validation error types.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Unsupported snapshot format version {found} (this build supports up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Malformed snapshot: {0}")]
    Malformed(String),

    #[error("Unknown config section: {0}")]
    UnknownSection(String),

    #[error("Empty config path")]
    EmptyPath,
}

/// Top-level configuration sections.
///
/// Section names double as the `SyncConflict` type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSection {
    /// General user preferences.
    Settings,
    /// Per-app configuration.
    WorkspaceApps,
    /// Per-plugin configuration.
    PluginSettings,
    /// Keyboard shortcuts.
    Keybindings,
    /// UI layout and appearance state.
    Ui,
    /// Sync settings themselves (policy, transports, intervals).
    SyncSettings,
    /// Notification rules.
    NotificationRules,
}

impl ConfigSection {
    /// All sections, in deterministic order.
    pub fn all() -> [ConfigSection; 7] {
        [
            ConfigSection::Settings,
            ConfigSection::WorkspaceApps,
            ConfigSection::PluginSettings,
            ConfigSection::Keybindings,
            ConfigSection::Ui,
            ConfigSection::SyncSettings,
            ConfigSection::NotificationRules,
        ]
    }

    /// Returns the canonical section name.
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSection::Settings => "settings",
            ConfigSection::WorkspaceApps => "workspace_apps",
            ConfigSection::PluginSettings => "plugin_settings",
            ConfigSection::Keybindings => "keybindings",
            ConfigSection::Ui => "ui",
            ConfigSection::SyncSettings => "sync_settings",
            ConfigSection::NotificationRules => "notification_rules",
        }
    }

    /// Parses a canonical section name.
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        match name {
            "settings" => Ok(ConfigSection::Settings),
            "workspace_apps" => Ok(ConfigSection::WorkspaceApps),
            "plugin_settings" => Ok(ConfigSection::PluginSettings),
            "keybindings" => Ok(ConfigSection::Keybindings),
            "ui" => Ok(ConfigSection::Ui),
            "sync_settings" => Ok(ConfigSection::SyncSettings),
            "notification_rules" => Ok(ConfigSection::NotificationRules),
            other => Err(ValidationError::UnknownSection(other.to_string())),
        }
    }
}

impl std::fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of the most recent mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastModified {
    /// Unix timestamp of the mutation.
    pub timestamp: u64,
    /// Device that performed it.
    pub device_id: String,
    /// Owning user.
    pub user_id: String,
}

/// The workspace configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Snapshot format version.
    pub format_version: u32,
    /// Section name -> JSON tree.
    sections: BTreeMap<String, Value>,
    /// Dotted leaf path ("settings.theme") -> Unix timestamp of last write.
    path_timestamps: BTreeMap<String, u64>,
    /// Provenance of the latest mutation anywhere in the tree.
    pub last_modified: LastModified,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceConfig {
    /// Creates an empty configuration at the current format version.
    pub fn new() -> Self {
        WorkspaceConfig {
            format_version: FORMAT_VERSION,
            sections: BTreeMap::new(),
            path_timestamps: BTreeMap::new(),
            last_modified: LastModified::default(),
        }
    }

    /// Returns a section's JSON tree, if present.
    pub fn section(&self, section: ConfigSection) -> Option<&Value> {
        self.sections.get(section.as_str())
    }

    /// Replaces a whole section tree without touching leaf timestamps.
    ///
    /// Used when applying a merged remote result; local edits go through
    /// [`WorkspaceConfig::set_value`].
    pub fn put_section(&mut self, section: ConfigSection, value: Value) {
        self.sections.insert(section.as_str().to_string(), value);
    }

    /// Reads a leaf value by dotted path within a section.
    pub fn get_value(&self, section: ConfigSection, path: &str) -> Option<&Value> {
        let mut node = self.sections.get(section.as_str())?;
        for part in path.split('.') {
            node = node.as_object()?.get(part)?;
        }
        Some(node)
    }

    /// Writes a leaf value by dotted path, stamping provenance.
    ///
    /// Intermediate objects are created as needed. Writing over a non-object
    /// intermediate replaces it.
    pub fn set_value(
        &mut self,
        section: ConfigSection,
        path: &str,
        value: Value,
        timestamp: u64,
        device_id: &str,
        user_id: &str,
    ) -> Result<(), ValidationError> {
        if path.is_empty() {
            return Err(ValidationError::EmptyPath);
        }

        let root = self
            .sections
            .entry(section.as_str().to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));

        let mut node = root;
        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            if !node.is_object() {
                *node = Value::Object(serde_json::Map::new());
            }
            let map = node.as_object_mut().expect("just ensured object");
            if parts.peek().is_none() {
                map.insert(part.to_string(), value);
                break;
            }
            node = map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
        }

        self.path_timestamps
            .insert(format!("{}.{}", section.as_str(), path), timestamp);
        self.last_modified = LastModified {
            timestamp,
            device_id: device_id.to_string(),
            user_id: user_id.to_string(),
        };
        Ok(())
    }

    /// Returns the write timestamp of a leaf path (0 if never stamped).
    pub fn path_timestamp(&self, section: ConfigSection, path: &str) -> u64 {
        self.path_timestamps
            .get(&format!("{}.{}", section.as_str(), path))
            .copied()
            .unwrap_or(0)
    }

    /// Returns the newest leaf timestamp within a section (0 if untouched).
    pub fn section_timestamp(&self, section: ConfigSection) -> u64 {
        let prefix = format!("{}.", section.as_str());
        self.path_timestamps
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(_, ts)| *ts)
            .max()
            .unwrap_or(0)
    }

    /// Iterates leaf timestamps within a section as (relative path, ts).
    pub fn section_path_timestamps(
        &self,
        section: ConfigSection,
    ) -> impl Iterator<Item = (&str, u64)> {
        let prefix_len = section.as_str().len() + 1;
        let prefix = format!("{}.", section.as_str());
        self.path_timestamps
            .range(prefix.clone()..)
            .take_while(move |(path, _)| path.starts_with(&prefix))
            .map(move |(path, ts)| (&path[prefix_len..], *ts))
    }

    /// Merges a remote config's leaf timestamps into this one (max wins).
    pub fn absorb_path_timestamps(&mut self, other: &WorkspaceConfig) {
        for (path, ts) in &other.path_timestamps {
            let entry = self.path_timestamps.entry(path.clone()).or_insert(0);
            *entry = (*entry).max(*ts);
        }
    }
}

/// A point-in-time capture of config tree plus vector clock.
///
/// This is the unit that gets sealed into an envelope and the unit the
/// coordinator rolls back to when a cycle fails partway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// The configuration tree.
    pub config: WorkspaceConfig,
    /// Causal position of this capture.
    pub clock: VectorClock,
}

impl ConfigSnapshot {
    /// Serializes and deflate-compresses the snapshot for sealing.
    pub fn to_payload(&self) -> Result<Vec<u8>, ValidationError> {
        let json =
            serde_json::to_vec(self).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Decompresses and parses a snapshot payload, enforcing format version.
    pub fn from_payload(payload: &[u8]) -> Result<Self, ValidationError> {
        let mut decoder = DeflateDecoder::new(payload);
        let mut json = Vec::new();
        decoder
            .read_to_end(&mut json)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        let snapshot: ConfigSnapshot =
            serde_json::from_slice(&json).map_err(|e| ValidationError::Malformed(e.to_string()))?;

        match snapshot.config.format_version {
            v if v > FORMAT_VERSION => Err(ValidationError::UnsupportedVersion {
                found: v,
                supported: FORMAT_VERSION,
            }),
            v if v < FORMAT_VERSION => Ok(Self::migrate(snapshot)),
            _ => Ok(snapshot),
        }
    }

    /// Upgrades an older-format snapshot to the current version.
    ///
    /// Version 1 is the first format; this is the seam later versions hook
    /// their transforms into.
    fn migrate(mut snapshot: ConfigSnapshot) -> ConfigSnapshot {
        snapshot.config.format_version = FORMAT_VERSION;
        snapshot
    }
}
