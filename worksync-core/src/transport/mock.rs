// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-Memory Transport
//!
//! A blob shared between transport instances, simulating a store two
//! devices read and write. Availability and failure injection are
//! controllable for exercising retry and rollback paths.

use std::sync::{Arc, Mutex};

use super::{Transport, TransportError, TransportKind, TransportResult};
use crate::sync::envelope::SyncEnvelope;

/// Shared blob state for paired [`MemoryTransport`] instances.
#[derive(Default)]
pub struct SharedBlob {
    blob: Mutex<Option<(Vec<u8>, u64)>>,
}

impl SharedBlob {
    /// Creates an empty shared blob.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// An in-memory transport over a shared blob.
///
/// Mirrors the cloud transport's single-blob semantics, including the
/// stash-before-overwrite behavior on upload.
pub struct MemoryTransport {
    shared: Arc<SharedBlob>,
    available: bool,
    /// Number of upcoming operations to fail with an unavailability error.
    fail_next: u32,
    clock: u64,
    stashed: Option<SyncEnvelope>,
}

impl MemoryTransport {
    /// Creates a transport over the given shared blob.
    pub fn new(shared: Arc<SharedBlob>) -> Self {
        MemoryTransport {
            shared,
            available: true,
            fail_next: 0,
            clock: 0,
            stashed: None,
        }
    }

    /// Creates a transport over a fresh private blob.
    pub fn isolated() -> Self {
        Self::new(SharedBlob::new())
    }

    /// Toggles reported availability.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Makes the next `n` operations fail as unavailable.
    pub fn fail_next(&mut self, n: u32) {
        self.fail_next = n;
    }

    fn check_failure(&mut self) -> TransportResult<()> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(TransportError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Cloud
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn upload_configuration(&mut self, envelope: &SyncEnvelope) -> TransportResult<()> {
        self.check_failure()?;
        let bytes = envelope.encode()?;
        self.clock += 1;
        let mut blob = self.shared.blob.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((existing, _)) = blob.as_ref() {
            self.stashed = Some(SyncEnvelope::decode(existing)?);
        }
        *blob = Some((bytes, self.clock));
        Ok(())
    }

    fn download_configuration(&mut self) -> TransportResult<Option<SyncEnvelope>> {
        self.check_failure()?;
        if let Some(stashed) = self.stashed.take() {
            return Ok(Some(stashed));
        }
        let blob = self.shared.blob.lock().unwrap_or_else(|e| e.into_inner());
        match blob.as_ref() {
            Some((bytes, _)) => Ok(Some(SyncEnvelope::decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn last_modified(&self) -> TransportResult<Option<u64>> {
        let blob = self.shared.blob.lock().unwrap_or_else(|e| e.into_inner());
        Ok(blob.as_ref().map(|(_, ts)| *ts))
    }
}
