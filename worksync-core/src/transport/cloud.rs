// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cloud Transport
//!
//! A blind blob store: the provider folder holds exactly one ciphertext
//! blob per workspace and never sees plaintext. Polled periodically; the
//! blob's modification time drives cheap change detection.
//!
//! The [`BlobStore`] seam abstracts the provider. [`DirBlobStore`] targets
//! a locally mounted provider folder (the common desktop case where the
//! provider's own client syncs a directory).

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use super::{Transport, TransportError, TransportKind, TransportResult};
use crate::crypto::{self, EncryptionAlgorithm, SymmetricKey};
use crate::sync::envelope::SyncEnvelope;

/// Blob file extension inside the provider folder.
const BLOB_EXTENSION: &str = "wsenv";

/// Storage seam for a provider-hosted blob folder.
pub trait BlobStore: Send {
    /// Returns true when the store is reachable.
    fn is_available(&self) -> bool;

    /// Writes the workspace blob, replacing any previous content.
    fn put(&mut self, workspace_id: &str, bytes: &[u8]) -> TransportResult<()>;

    /// Reads the workspace blob.
    fn get(&self, workspace_id: &str) -> TransportResult<Option<Vec<u8>>>;

    /// Unix timestamp of the blob's last modification.
    fn last_modified(&self, workspace_id: &str) -> TransportResult<Option<u64>>;
}

/// A provider folder mounted in the local filesystem.
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    /// Creates a store over the given folder.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        DirBlobStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn blob_path(&self, workspace_id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", workspace_id, BLOB_EXTENSION))
    }
}

impl BlobStore for DirBlobStore {
    fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    fn put(&mut self, workspace_id: &str, bytes: &[u8]) -> TransportResult<()> {
        // Write-then-rename so the provider's sync client never ships a
        // half-written blob.
        let path = self.blob_path(workspace_id);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, workspace_id: &str) -> TransportResult<Option<Vec<u8>>> {
        let path = self.blob_path(workspace_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(&path)?))
    }

    fn last_modified(&self, workspace_id: &str) -> TransportResult<Option<u64>> {
        let path = self.blob_path(workspace_id);
        if !path.exists() {
            return Ok(None);
        }
        let modified = std::fs::metadata(&path)?.modified()?;
        Ok(Some(
            modified
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        ))
    }
}

/// Provider credentials, encrypted at rest with the storage key.
///
/// The provider never sees plaintext config; these credentials only
/// authorize blob reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudCredentials {
    /// Provider identifier (e.g. "dropbox", "gdrive", "webdav").
    pub provider: String,
    /// Account identifier at the provider.
    pub account: String,
    /// Provider access secret.
    pub secret: String,
}

impl CloudCredentials {
    /// Seals the credentials for at-rest storage.
    pub fn seal(&self, key: &SymmetricKey) -> TransportResult<Vec<u8>> {
        let plaintext = serde_json::to_vec(self)
            .map_err(|e| TransportError::Credentials(e.to_string()))?;
        crypto::encrypt(
            key,
            EncryptionAlgorithm::default(),
            &plaintext,
            self.provider.as_bytes(),
        )
        .map_err(|e| TransportError::Credentials(e.to_string()))
    }

    /// Opens sealed credentials.
    pub fn open(key: &SymmetricKey, provider: &str, sealed: &[u8]) -> TransportResult<Self> {
        let plaintext = crypto::decrypt(key, sealed, provider.as_bytes())
            .map_err(|e| TransportError::Credentials(e.to_string()))?;
        serde_json::from_slice(&plaintext).map_err(|e| TransportError::Credentials(e.to_string()))
    }
}

/// The cloud-folder transport.
///
/// The folder holds exactly one blob per workspace, so uploading would
/// clobber whatever a peer published since our last cycle. Upload
/// therefore stashes the existing blob first; the following download
/// returns the stashed envelope so no peer data is lost to the overwrite.
pub struct CloudTransport {
    workspace_id: String,
    store: Box<dyn BlobStore>,
    stashed: Option<SyncEnvelope>,
}

impl CloudTransport {
    /// Creates a transport for a workspace over the given store.
    pub fn new(workspace_id: &str, store: Box<dyn BlobStore>) -> Self {
        CloudTransport {
            workspace_id: workspace_id.to_string(),
            store,
            stashed: None,
        }
    }
}

impl Transport for CloudTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Cloud
    }

    fn is_available(&self) -> bool {
        self.store.is_available()
    }

    fn upload_configuration(&mut self, envelope: &SyncEnvelope) -> TransportResult<()> {
        if let Some(existing) = self.store.get(&self.workspace_id)? {
            self.stashed = Some(SyncEnvelope::decode(&existing)?);
        }
        let bytes = envelope.encode()?;
        self.store.put(&self.workspace_id, &bytes)
    }

    fn download_configuration(&mut self) -> TransportResult<Option<SyncEnvelope>> {
        if let Some(stashed) = self.stashed.take() {
            return Ok(Some(stashed));
        }
        match self.store.get(&self.workspace_id)? {
            Some(bytes) => Ok(Some(SyncEnvelope::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn last_modified(&self) -> TransportResult<Option<u64>> {
        self.store.last_modified(&self.workspace_id)
    }
}
