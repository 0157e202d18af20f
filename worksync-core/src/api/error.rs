// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! API Error Types
//!
//! Unified error type for the Worksync API layer.

use thiserror::Error;

use crate::config::model::ValidationError;
use crate::crypto::keys::{DecryptionError, KeyError};
use crate::pairing::PairingError;
use crate::storage::StorageError;
use crate::sync::coordinator::SyncError;
use crate::sync::envelope::EnvelopeError;
use crate::transport::TransportError;

/// Unified error type for Worksync operations.
#[derive(Error, Debug)]
pub enum WorksyncError {
    /// Sync cycle failed.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Transport operation failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Envelope could not be opened.
    #[error("decryption error: {0}")]
    Decryption(#[from] DecryptionError),

    /// Key management operation failed.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// Pairing operation failed.
    #[error("pairing error: {0}")]
    Pairing(#[from] PairingError),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Snapshot failed schema validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Envelope encoding failed.
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Workspace not initialized.
    #[error("workspace not initialized")]
    NotInitialized,

    /// Already initialized.
    #[error("already initialized")]
    AlreadyInitialized,

    /// Invalid operation in current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for Worksync operations.
pub type WorksyncResult<T> = Result<T, WorksyncError>;
