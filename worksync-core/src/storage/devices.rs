// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device registry storage operations.

use rusqlite::params;

use super::{Storage, StorageError};
use crate::pairing::DevicePairingRegistry;

impl Storage {
    /// Saves the pairing registry, encrypted at rest.
    pub fn save_device_registry(
        &self,
        registry: &DevicePairingRegistry,
    ) -> Result<(), StorageError> {
        let sealed = self.seal_column(registry.to_json().as_bytes())?;
        self.conn.execute(
            "INSERT OR REPLACE INTO device_registry (id, registry_encrypted, updated_at)
             VALUES (1, ?1, ?2)",
            params![sealed, Self::now() as i64],
        )?;
        Ok(())
    }

    /// Loads the pairing registry.
    pub fn load_device_registry(&self) -> Result<Option<DevicePairingRegistry>, StorageError> {
        let result = self.conn.query_row(
            "SELECT registry_encrypted FROM device_registry WHERE id = 1",
            [],
            |row| row.get::<_, Vec<u8>>(0),
        );

        match result {
            Ok(sealed) => {
                let json = self.open_column(&sealed)?;
                let json = String::from_utf8(json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                let registry = DevicePairingRegistry::from_json(&json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(registry))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Database(e)),
        }
    }
}
