// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Conflict storage operations.
//!
//! Conflicts are durable: created by the detector, listed for the UI, and
//! deleted only when explicitly resolved.

use rusqlite::params;

use super::{Storage, StorageError};
use crate::sync::conflict::SyncConflict;

impl Storage {
    /// Saves a conflict, encrypted at rest.
    pub fn save_conflict(&self, conflict: &SyncConflict) -> Result<(), StorageError> {
        let json = serde_json::to_vec(conflict)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let sealed = self.seal_column(&json)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO conflicts (id, conflict_encrypted, created_at)
             VALUES (?1, ?2, ?3)",
            params![conflict.id, sealed, Self::now() as i64],
        )?;
        Ok(())
    }

    /// Loads a conflict by id.
    pub fn load_conflict(&self, id: &str) -> Result<Option<SyncConflict>, StorageError> {
        let result = self.conn.query_row(
            "SELECT conflict_encrypted FROM conflicts WHERE id = ?1",
            params![id],
            |row| row.get::<_, Vec<u8>>(0),
        );

        match result {
            Ok(sealed) => {
                let json = self.open_column(&sealed)?;
                let conflict: SyncConflict = serde_json::from_slice(&json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(conflict))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Database(e)),
        }
    }

    /// Lists all stored conflicts, oldest first.
    pub fn list_conflicts(&self) -> Result<Vec<SyncConflict>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT conflict_encrypted FROM conflicts ORDER BY created_at, id")?;

        let sealed_blobs: Vec<Vec<u8>> = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut conflicts = Vec::with_capacity(sealed_blobs.len());
        for sealed in sealed_blobs {
            let json = self.open_column(&sealed)?;
            let conflict: SyncConflict = serde_json::from_slice(&json)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            conflicts.push(conflict);
        }
        Ok(conflicts)
    }

    /// Number of stored conflicts.
    pub fn count_conflicts(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM conflicts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Deletes a conflict after resolution. Returns true if it existed.
    pub fn delete_conflict(&self, id: &str) -> Result<bool, StorageError> {
        let rows = self
            .conn
            .execute("DELETE FROM conflicts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
