// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transports
//!
//! Delivery mechanisms for sealed sync envelopes. Every transport moves the
//! same opaque [`SyncEnvelope`]; the merge step treats inbound envelopes
//! uniformly regardless of origin.
//!
//! - [`cloud`]: one ciphertext blob per workspace in a provider folder.
//! - [`lan`]: discovered peers on the local network, allow-list gated.
//! - [`import_export`]: passphrase-protected archives for offline bridging
//!   and first-pairing bootstrap.
//! - [`mock`]: in-memory transport for tests.

pub mod cloud;
pub mod import_export;
pub mod lan;
pub mod mock;

use thiserror::Error;

use crate::sync::envelope::{EnvelopeError, SyncEnvelope};

pub use cloud::{BlobStore, CloudCredentials, CloudTransport, DirBlobStore};
pub use import_export::{ImportExportTransport, SyncArchive};
pub use lan::{
    serve_channel, DiscoveredPeer, LanBeacon, LanTransport, PeerChannel, PeerConnector,
    PeerDiscovery,
};
pub use mock::{MemoryTransport, SharedBlob};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport error types.
///
/// Network-ish failures are retryable with backoff; structural failures
/// (malformed envelope, allow-list rejection) are not.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Device not on allow-list: {0}")]
    NotAllowed(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Passphrase too weak: {0}")]
    WeakPassphrase(String),

    #[error("Credential error: {0}")]
    Credentials(String),
}

impl TransportError {
    /// Returns true when a retry with backoff is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Unavailable(_) | TransportError::Io(_))
    }
}

/// The built-in transport kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Provider-hosted blob folder.
    Cloud,
    /// Direct LAN peers.
    Lan,
    /// Manual archive export/import.
    ImportExport,
}

impl TransportKind {
    /// Returns the canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Cloud => "cloud",
            TransportKind::Lan => "lan",
            TransportKind::ImportExport => "import-export",
        }
    }
}

/// A delivery mechanism for sealed envelopes.
pub trait Transport: Send {
    /// Which kind this transport is.
    fn kind(&self) -> TransportKind;

    /// Returns true when the transport can currently move data.
    fn is_available(&self) -> bool;

    /// Publishes the envelope.
    fn upload_configuration(&mut self, envelope: &SyncEnvelope) -> TransportResult<()>;

    /// Fetches the latest remote envelope, if any.
    fn download_configuration(&mut self) -> TransportResult<Option<SyncEnvelope>>;

    /// True when the transport can push change notifications.
    fn supports_real_time_updates(&self) -> bool {
        false
    }

    /// Unix timestamp of the newest remote data, when the transport knows.
    fn last_modified(&self) -> TransportResult<Option<u64>> {
        Ok(None)
    }

    /// Receives the trusted-device allow-list when it changes.
    ///
    /// Only peer transports restrict by device; the default ignores it.
    fn set_allow_list(&mut self, _allow_list: &std::collections::BTreeSet<String>) {}
}

/// Routes a sync cycle across the registered transports.
///
/// More than one transport may serve a cycle (e.g. LAN plus cloud); every
/// downloaded envelope feeds the same merge.
#[derive(Default)]
pub struct TransportManager {
    transports: Vec<Box<dyn Transport>>,
}

impl TransportManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transport.
    pub fn register(&mut self, transport: Box<dyn Transport>) {
        self.transports.push(transport);
    }

    /// Drops all registered transports.
    pub fn clear(&mut self) {
        self.transports.clear();
    }

    /// Forwards the trusted-device allow-list to every transport.
    pub fn set_allow_list(&mut self, allow_list: &std::collections::BTreeSet<String>) {
        for transport in &mut self.transports {
            transport.set_allow_list(allow_list);
        }
    }

    /// Returns the kinds currently reachable.
    pub fn available_kinds(&self) -> Vec<TransportKind> {
        self.transports
            .iter()
            .filter(|t| t.is_available())
            .map(|t| t.kind())
            .collect()
    }

    /// Returns true when at least one transport is reachable.
    pub fn has_available(&self) -> bool {
        self.transports.iter().any(|t| t.is_available())
    }

    /// Uploads to every available transport.
    ///
    /// Succeeds when at least one transport accepted the envelope; fails
    /// with the last error when none did.
    pub fn upload(&mut self, envelope: &SyncEnvelope) -> TransportResult<usize> {
        let mut delivered = 0;
        let mut last_error: Option<TransportError> = None;

        for transport in self.transports.iter_mut().filter(|t| t.is_available()) {
            match transport.upload_configuration(envelope) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(kind = ?transport.kind(), error = %e, "upload failed");
                    last_error = Some(e);
                }
            }
        }

        if delivered > 0 {
            Ok(delivered)
        } else {
            Err(last_error
                .unwrap_or_else(|| TransportError::Unavailable("no transport reachable".into())))
        }
    }

    /// Downloads from every available transport.
    ///
    /// Returns all envelopes received plus any per-transport errors; the
    /// caller decides whether partial results suffice.
    pub fn download(&mut self) -> (Vec<SyncEnvelope>, Vec<TransportError>) {
        let mut envelopes = Vec::new();
        let mut errors = Vec::new();

        for transport in self.transports.iter_mut().filter(|t| t.is_available()) {
            match transport.download_configuration() {
                Ok(Some(envelope)) => envelopes.push(envelope),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(kind = ?transport.kind(), error = %e, "download failed");
                    errors.push(e);
                }
            }
        }

        (envelopes, errors)
    }
}
