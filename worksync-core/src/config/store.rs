// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Config Store
//!
//! The single serialization point for workspace config mutation. All writes
//! to the tree and the vector clock go through one lock; no two in-process
//! callers can interleave a clock bump with a tree edit.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use super::model::{ConfigSection, ConfigSnapshot, ValidationError, WorkspaceConfig};
use crate::sync::clock::VectorClock;

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

struct StoreInner {
    config: WorkspaceConfig,
    clock: VectorClock,
    /// Local mutations since the last successful sync.
    pending_changes: u64,
}

/// Owns the in-memory config tree and its vector clock.
pub struct ConfigStore {
    device_id: String,
    user_id: String,
    inner: Mutex<StoreInner>,
}

impl ConfigStore {
    /// Creates a store with an empty config.
    pub fn new(device_id: &str, user_id: &str) -> Self {
        Self::from_parts(device_id, user_id, WorkspaceConfig::new(), VectorClock::new())
    }

    /// Creates a store from persisted state.
    pub fn from_parts(
        device_id: &str,
        user_id: &str,
        config: WorkspaceConfig,
        clock: VectorClock,
    ) -> Self {
        ConfigStore {
            device_id: device_id.to_string(),
            user_id: user_id.to_string(),
            inner: Mutex::new(StoreInner {
                config,
                clock,
                pending_changes: 0,
            }),
        }
    }

    /// Returns the owning device id.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Writes a leaf value, bumping the local clock entry.
    pub fn set_value(
        &self,
        section: ConfigSection,
        path: &str,
        value: Value,
    ) -> Result<(), ValidationError> {
        let mut inner = self.lock();
        inner.config.set_value(
            section,
            path,
            value,
            current_timestamp(),
            &self.device_id,
            &self.user_id,
        )?;
        inner.clock.increment(&self.device_id);
        inner.pending_changes += 1;
        Ok(())
    }

    /// Reads a leaf value.
    pub fn get_value(&self, section: ConfigSection, path: &str) -> Option<Value> {
        let inner = self.lock();
        inner.config.get_value(section, path).cloned()
    }

    /// Returns a consistent capture of config and clock.
    pub fn snapshot(&self) -> ConfigSnapshot {
        let inner = self.lock();
        ConfigSnapshot {
            config: inner.config.clone(),
            clock: inner.clock.clone(),
        }
    }

    /// Atomically replaces config and clock with a merged result.
    ///
    /// This is the all-or-nothing apply step of a sync cycle: the cycle
    /// builds the full replacement first and swaps it in one lock hold, so
    /// a failure anywhere earlier leaves the pre-cycle state untouched.
    pub fn replace(&self, snapshot: ConfigSnapshot) {
        let mut inner = self.lock();
        inner.config = snapshot.config;
        inner.clock = snapshot.clock;
    }

    /// Replaces one section with a resolved value, bumping the local clock.
    ///
    /// Used when a conflict resolution is applied: the decision is a local
    /// mutation and advances only this device's clock entry.
    pub fn apply_section(&self, section: ConfigSection, value: Value) {
        let mut inner = self.lock();
        inner.config.put_section(section, value);
        inner.config.last_modified = crate::config::model::LastModified {
            timestamp: current_timestamp(),
            device_id: self.device_id.clone(),
            user_id: self.user_id.clone(),
        };
        inner.clock.increment(&self.device_id);
        inner.pending_changes += 1;
    }

    /// Returns the current clock.
    pub fn clock(&self) -> VectorClock {
        self.lock().clock.clone()
    }

    /// Returns the number of local mutations not yet synced.
    pub fn pending_changes(&self) -> u64 {
        self.lock().pending_changes
    }

    /// Resets the pending-change counter after a successful cycle.
    pub fn mark_synced(&self) {
        self.lock().pending_changes = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // A poisoned lock only means another thread panicked mid-write;
        // the data is still structurally valid JSON + clock.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
