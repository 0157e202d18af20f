// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cloud provider credential storage operations.
//!
//! Credentials are sealed by the transport layer before they reach
//! storage, so this table only ever holds ciphertext.

use rusqlite::params;

use super::{Storage, StorageError};

impl Storage {
    /// Saves sealed provider credentials.
    pub fn save_cloud_credentials(
        &self,
        provider: &str,
        sealed: &[u8],
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO cloud_credentials (provider, credentials_sealed, updated_at)
             VALUES (?1, ?2, ?3)",
            params![provider, sealed, Self::now() as i64],
        )?;
        Ok(())
    }

    /// Loads sealed provider credentials.
    pub fn load_cloud_credentials(&self, provider: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let result = self.conn.query_row(
            "SELECT credentials_sealed FROM cloud_credentials WHERE provider = ?1",
            params![provider],
            |row| row.get::<_, Vec<u8>>(0),
        );

        match result {
            Ok(sealed) => Ok(Some(sealed)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Database(e)),
        }
    }

    /// Deletes provider credentials. Returns true if they existed.
    pub fn delete_cloud_credentials(&self, provider: &str) -> Result<bool, StorageError> {
        let rows = self.conn.execute(
            "DELETE FROM cloud_credentials WHERE provider = ?1",
            params![provider],
        )?;
        Ok(rows > 0)
    }
}
