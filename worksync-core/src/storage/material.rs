// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Encryption material storage operations.
//!
//! The epoch and epoch floor are stored alongside the sealed material so
//! the anti-rollback check survives restarts even if the material blob is
//! replaced.

use rusqlite::params;

use super::{Storage, StorageError};
use crate::crypto::EncryptionMaterial;

impl Storage {
    /// Saves the non-secret encryption material, encrypted at rest.
    pub fn save_encryption_material(
        &self,
        material: &EncryptionMaterial,
        epoch_floor: u64,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_vec(material)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let sealed = self.seal_column(&json)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO encryption_material
             (id, material_encrypted, epoch, epoch_floor, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                sealed,
                material.epoch as i64,
                epoch_floor as i64,
                Self::now() as i64,
            ],
        )?;
        Ok(())
    }

    /// Loads the encryption material and persisted epoch floor.
    pub fn load_encryption_material(
        &self,
    ) -> Result<Option<(EncryptionMaterial, u64)>, StorageError> {
        let result = self.conn.query_row(
            "SELECT material_encrypted, epoch_floor FROM encryption_material WHERE id = 1",
            [],
            |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)),
        );

        match result {
            Ok((sealed, epoch_floor)) => {
                let json = self.open_column(&sealed)?;
                let material: EncryptionMaterial = serde_json::from_slice(&json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some((material, epoch_floor as u64)))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Database(e)),
        }
    }
}
