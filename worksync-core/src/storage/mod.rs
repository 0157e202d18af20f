// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persistent Storage Module
//!
//! Encrypted local persistence for workspace sync state: vector clock,
//! device registry with wrapped keys, last-known-good config snapshot,
//! encryption material and rotation epoch, deferred conflicts and cloud
//! credentials. SQLite with application-level encryption of sensitive
//! columns; the storage key itself lives in secure storage.

#[cfg(feature = "testing")]
pub mod conflicts;
#[cfg(not(feature = "testing"))]
mod conflicts;

#[cfg(feature = "testing")]
pub mod credentials;
#[cfg(not(feature = "testing"))]
mod credentials;

#[cfg(feature = "testing")]
pub mod devices;
#[cfg(not(feature = "testing"))]
mod devices;

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
mod error;

#[cfg(feature = "testing")]
pub mod material;
#[cfg(not(feature = "testing"))]
mod material;

#[cfg(feature = "testing")]
pub mod workspace;
#[cfg(not(feature = "testing"))]
mod workspace;

pub mod migration;
pub mod secure;

pub use error::StorageError;
pub use secure::{FileKeyStorage, MemoryKeyStorage, SecureStorage};
pub use workspace::WorkspaceMeta;

#[cfg(feature = "secure-storage")]
pub use secure::PlatformKeyring;

use rusqlite::Connection;
use std::path::Path;

use crate::crypto::{self, EncryptionAlgorithm, SymmetricKey};

/// SQLite-based storage implementation.
///
/// Stores data in a local SQLite database with application-level
/// encryption for sensitive columns (snapshots, registry, material).
pub struct Storage {
    conn: Connection,
    /// Encryption key for at-rest columns, from secure storage.
    pub(crate) encryption_key: SymmetricKey,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    pub fn open<P: AsRef<Path>>(
        path: P,
        encryption_key: SymmetricKey,
    ) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let storage = Storage {
            conn,
            encryption_key,
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Creates an in-memory storage (for testing).
    pub fn in_memory(encryption_key: SymmetricKey) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Storage {
            conn,
            encryption_key,
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Runs all pending schema migrations.
    fn run_migrations(&self) -> Result<(), StorageError> {
        let migrations = migration::all_migrations();
        migration::MigrationRunner::run(&self.conn, &self.encryption_key, &migrations)
    }

    /// Returns the current schema version.
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        migration::MigrationRunner::current_version(&self.conn)
    }

    /// Encrypts a column value with the storage key.
    pub(crate) fn seal_column(&self, plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
        crypto::encrypt(
            &self.encryption_key,
            EncryptionAlgorithm::default(),
            plaintext,
            b"",
        )
        .map_err(|e| StorageError::Encryption(e.to_string()))
    }

    /// Decrypts a column value with the storage key.
    pub(crate) fn open_column(&self, sealed: &[u8]) -> Result<Vec<u8>, StorageError> {
        crypto::decrypt(&self.encryption_key, sealed, b"")
            .map_err(|e| StorageError::Encryption(e.to_string()))
    }

    pub(crate) fn now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
