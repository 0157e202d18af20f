// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Secure Storage Module
//!
//! Platform-native secure storage for sensitive keys (device secrets, the
//! storage key, the workspace sync key). Uses OS keychains (macOS
//! Keychain, Linux Secret Service, Windows Credential Manager) when
//! available, with a fallback to encrypted file storage.

use crate::storage::StorageError;
use std::path::PathBuf;

/// Well-known secure storage entry names.
pub mod entries {
    /// At-rest encryption key for the SQLite columns.
    pub const STORAGE_KEY: &str = "storage_key";
    /// This device's X25519 secret.
    pub const DEVICE_SECRET: &str = "device_secret";
    /// This device's Ed25519 seed.
    pub const SIGNING_SEED: &str = "signing_seed";
    /// The workspace sync key.
    pub const SYNC_KEY: &str = "sync_key";
}

/// Trait for secure storage of cryptographic keys.
///
/// Implementations should use platform-native secure storage when available:
/// - macOS: Keychain
/// - Linux: Secret Service (GNOME Keyring, KDE Wallet)
/// - Windows: Credential Manager
pub trait SecureStorage: Send + Sync {
    /// Saves a key to secure storage.
    fn save_key(&self, name: &str, key: &[u8]) -> Result<(), StorageError>;

    /// Loads a key from secure storage.
    /// Returns None if the key doesn't exist.
    fn load_key(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Deletes a key from secure storage.
    fn delete_key(&self, name: &str) -> Result<(), StorageError>;

    /// Checks if a key exists in secure storage.
    fn has_key(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.load_key(name)?.is_some())
    }
}

/// Platform keyring implementation using the `keyring` crate.
/// Available when the `secure-storage` feature is enabled.
#[cfg(feature = "secure-storage")]
pub struct PlatformKeyring {
    service: String,
}

#[cfg(feature = "secure-storage")]
impl PlatformKeyring {
    /// Creates a new platform keyring accessor.
    ///
    /// # Arguments
    /// * `service` - The service name to use for keychain entries (e.g., "worksync")
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

#[cfg(feature = "secure-storage")]
impl SecureStorage for PlatformKeyring {
    fn save_key(&self, name: &str, key: &[u8]) -> Result<(), StorageError> {
        let entry = keyring::Entry::new(&self.service, name)
            .map_err(|e| StorageError::Encryption(format!("Keyring error: {}", e)))?;

        entry
            .set_secret(key)
            .map_err(|e| StorageError::Encryption(format!("Failed to save to keychain: {}", e)))
    }

    fn load_key(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let entry = keyring::Entry::new(&self.service, name)
            .map_err(|e| StorageError::Encryption(format!("Keyring error: {}", e)))?;

        match entry.get_secret() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::Encryption(format!(
                "Failed to load from keychain: {}",
                e
            ))),
        }
    }

    fn delete_key(&self, name: &str) -> Result<(), StorageError> {
        let entry = keyring::Entry::new(&self.service, name)
            .map_err(|e| StorageError::Encryption(format!("Keyring error: {}", e)))?;

        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
            Err(e) => Err(StorageError::Encryption(format!(
                "Failed to delete from keychain: {}",
                e
            ))),
        }
    }
}

/// File-based key storage (fallback when keyring is unavailable).
/// Keys are stored encrypted in a file using application-level encryption.
pub struct FileKeyStorage {
    path: PathBuf,
    encryption_key: crate::crypto::SymmetricKey,
}

impl FileKeyStorage {
    /// Creates a new file-based key storage.
    ///
    /// # Arguments
    /// * `path` - Path to the directory where keys will be stored
    /// * `encryption_key` - Key used to encrypt stored keys
    pub fn new(path: PathBuf, encryption_key: crate::crypto::SymmetricKey) -> Self {
        Self {
            path,
            encryption_key,
        }
    }

    fn key_file_path(&self, name: &str) -> PathBuf {
        // Sanitize the name to prevent path traversal
        let safe_name = name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>();
        self.path.join(format!("{}.key", safe_name))
    }
}

impl SecureStorage for FileKeyStorage {
    fn save_key(&self, name: &str, key: &[u8]) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.path)
            .map_err(|e| StorageError::Encryption(format!("Failed to create directory: {}", e)))?;

        let encrypted = crate::crypto::encrypt(
            &self.encryption_key,
            crate::crypto::EncryptionAlgorithm::default(),
            key,
            name.as_bytes(),
        )
        .map_err(|e| StorageError::Encryption(format!("Encryption failed: {}", e)))?;

        let file_path = self.key_file_path(name);
        std::fs::write(&file_path, &encrypted)
            .map_err(|e| StorageError::Encryption(format!("Failed to write key file: {}", e)))
    }

    fn load_key(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let file_path = self.key_file_path(name);

        if !file_path.exists() {
            return Ok(None);
        }

        let encrypted = std::fs::read(&file_path)
            .map_err(|e| StorageError::Encryption(format!("Failed to read key file: {}", e)))?;

        let key = crate::crypto::decrypt(&self.encryption_key, &encrypted, name.as_bytes())
            .map_err(|e| StorageError::Encryption(format!("Decryption failed: {}", e)))?;

        Ok(Some(key))
    }

    fn delete_key(&self, name: &str) -> Result<(), StorageError> {
        let file_path = self.key_file_path(name);

        if file_path.exists() {
            std::fs::remove_file(&file_path).map_err(|e| {
                StorageError::Encryption(format!("Failed to delete key file: {}", e))
            })?;
        }

        Ok(())
    }
}

/// In-memory storage for testing.
pub struct MemoryKeyStorage {
    keys: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl Default for MemoryKeyStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKeyStorage {
    /// Creates an empty in-memory key store.
    pub fn new() -> Self {
        Self {
            keys: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }
}

impl SecureStorage for MemoryKeyStorage {
    fn save_key(&self, name: &str, key: &[u8]) -> Result<(), StorageError> {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), key.to_vec());
        Ok(())
    }

    fn load_key(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned())
    }

    fn delete_key(&self, name: &str) -> Result<(), StorageError> {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        Ok(())
    }
}
