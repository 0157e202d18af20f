// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Workspace metadata, vector clock and snapshot storage operations.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{Storage, StorageError};
use crate::config::model::ConfigSnapshot;
use crate::sync::clock::VectorClock;

/// Identity of the local workspace and device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMeta {
    /// Workspace id shared by all devices in the set.
    pub workspace_id: String,
    /// Owning user id.
    pub user_id: String,
    /// This device's id.
    pub device_id: String,
    /// This device's name.
    pub device_name: String,
    /// Unix timestamp of first run.
    pub created_at: u64,
}

impl Storage {
    // === Workspace Meta ===

    /// Saves workspace identity. Written once at first run.
    pub fn save_workspace_meta(&self, meta: &WorkspaceMeta) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO workspace_meta
             (id, workspace_id, user_id, device_id, device_name, created_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                meta.workspace_id,
                meta.user_id,
                meta.device_id,
                meta.device_name,
                meta.created_at as i64,
            ],
        )?;
        Ok(())
    }

    /// Loads workspace identity.
    pub fn load_workspace_meta(&self) -> Result<Option<WorkspaceMeta>, StorageError> {
        let result = self.conn.query_row(
            "SELECT workspace_id, user_id, device_id, device_name, created_at
             FROM workspace_meta WHERE id = 1",
            [],
            |row| {
                Ok(WorkspaceMeta {
                    workspace_id: row.get(0)?,
                    user_id: row.get(1)?,
                    device_id: row.get(2)?,
                    device_name: row.get(3)?,
                    created_at: row.get::<_, i64>(4)? as u64,
                })
            },
        );

        match result {
            Ok(meta) => Ok(Some(meta)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Database(e)),
        }
    }

    // === Vector Clock ===

    /// Saves the local vector clock.
    pub fn save_vector_clock(&self, clock: &VectorClock) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO vector_clock (id, clock_json, updated_at)
             VALUES (1, ?1, ?2)",
            params![clock.to_json(), Self::now() as i64],
        )?;
        Ok(())
    }

    /// Loads the local vector clock.
    pub fn load_vector_clock(&self) -> Result<Option<VectorClock>, StorageError> {
        let result = self.conn.query_row(
            "SELECT clock_json FROM vector_clock WHERE id = 1",
            [],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => {
                let clock = VectorClock::from_json(&json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(clock))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Database(e)),
        }
    }

    // === Config Snapshot ===

    /// Saves the last-known-good config snapshot, encrypted at rest.
    pub fn save_config_snapshot(&self, snapshot: &ConfigSnapshot) -> Result<(), StorageError> {
        let payload = snapshot
            .to_payload()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let sealed = self.seal_column(&payload)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO config_snapshot (id, snapshot_encrypted, updated_at)
             VALUES (1, ?1, ?2)",
            params![sealed, Self::now() as i64],
        )?;
        Ok(())
    }

    /// Loads the last-known-good config snapshot.
    pub fn load_config_snapshot(&self) -> Result<Option<ConfigSnapshot>, StorageError> {
        let result = self.conn.query_row(
            "SELECT snapshot_encrypted FROM config_snapshot WHERE id = 1",
            [],
            |row| row.get::<_, Vec<u8>>(0),
        );

        match result {
            Ok(sealed) => {
                let payload = self.open_column(&sealed)?;
                let snapshot = ConfigSnapshot::from_payload(&payload)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(snapshot))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Database(e)),
        }
    }
}
