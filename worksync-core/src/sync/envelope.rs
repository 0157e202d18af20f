// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Envelope Wire Format
//!
//! The unit every transport carries: a cleartext header (workspace id,
//! sender device, vector clock, key epoch) followed by the AEAD-sealed
//! config snapshot. The encoded header prefix is fed to the cipher as
//! associated data, so any tampering with the cleartext fields fails the
//! authentication tag check.
//!
//! Layout: `WSEN || version (1) || header_len (u32 BE) || header (bincode)
//!          || body (alg_tag || nonce || ciphertext || tag)`

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::clock::VectorClock;
use crate::crypto::keys::{DecryptionError, EncryptionManager, KeyError, WrappedKey};

/// Envelope magic bytes.
const MAGIC: &[u8; 4] = b"WSEN";

/// Envelope format version.
const ENVELOPE_VERSION: u8 = 1;

/// Fixed prefix length: magic (4) + version (1) + header_len (4).
const PREFIX_LEN: usize = 9;

/// Upper bound on the encoded header, to reject garbage lengths early.
const MAX_HEADER_LEN: usize = 64 * 1024;

/// Envelope encoding/decoding error types.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Envelope too short")]
    TooShort,

    #[error("Not a sync envelope (bad magic)")]
    BadMagic,

    #[error("Unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    #[error("Malformed envelope header: {0}")]
    MalformedHeader(String),

    #[error("Sealing failed: {0}")]
    Seal(#[from] KeyError),
}

/// Cleartext envelope header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Workspace this envelope belongs to.
    pub workspace_id: String,
    /// Device that sealed it.
    pub sender_device_id: String,
    /// Clock of the snapshot inside.
    pub vector_clock: VectorClock,
    /// Key epoch the body is sealed under.
    pub epoch: u64,
    /// Current wrap set, one per trusted device.
    ///
    /// Wraps are ciphertext, so exposing them here is safe, and riding
    /// along in every envelope is how a device that missed a rotation
    /// while offline recovers: its own wrap (from a sender it already
    /// trusts) upgrades it to the new epoch before the body is opened. A
    /// removed device finds no wrap and surfaces the re-pairing state.
    pub key_wraps: Vec<WrappedKey>,
}

/// A sealed config snapshot ready for any transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEnvelope {
    /// Cleartext header.
    pub header: EnvelopeHeader,
    /// AEAD output: `alg_tag || nonce || ciphertext || tag`.
    pub body: Vec<u8>,
}

impl SyncEnvelope {
    /// Seals a snapshot payload under the workspace sync key.
    pub fn seal(
        manager: &EncryptionManager,
        header: EnvelopeHeader,
        payload: &[u8],
    ) -> Result<Self, EnvelopeError> {
        let aad = Self::header_prefix(&header)?;
        let body = manager.seal(&aad, payload)?;
        Ok(SyncEnvelope { header, body })
    }

    /// Opens the sealed body, enforcing epoch monotonicity.
    pub fn open(&self, manager: &mut EncryptionManager) -> Result<Vec<u8>, DecryptionError> {
        let aad = Self::header_prefix(&self.header)
            .map_err(|_| DecryptionError::AuthenticationFailed)?;
        manager.open(self.header.epoch, &aad, &self.body)
    }

    /// Encodes the envelope for the wire.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut out = Self::header_prefix(&self.header)?;
        out.extend_from_slice(&self.body);
        Ok(out)
    }

    /// Decodes an envelope from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < PREFIX_LEN {
            return Err(EnvelopeError::TooShort);
        }
        if &bytes[0..4] != MAGIC {
            return Err(EnvelopeError::BadMagic);
        }
        let version = bytes[4];
        if version != ENVELOPE_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(version));
        }

        let header_len = u32::from_be_bytes(
            bytes[5..9]
                .try_into()
                .map_err(|_| EnvelopeError::TooShort)?,
        ) as usize;
        if header_len > MAX_HEADER_LEN {
            return Err(EnvelopeError::MalformedHeader(format!(
                "header length {} exceeds maximum",
                header_len
            )));
        }
        if bytes.len() < PREFIX_LEN + header_len {
            return Err(EnvelopeError::TooShort);
        }

        let header: EnvelopeHeader = bincode::deserialize(&bytes[PREFIX_LEN..PREFIX_LEN + header_len])
            .map_err(|e| EnvelopeError::MalformedHeader(e.to_string()))?;

        Ok(SyncEnvelope {
            header,
            body: bytes[PREFIX_LEN + header_len..].to_vec(),
        })
    }

    /// Encodes the cleartext prefix (magic, version, length, header).
    ///
    /// This exact byte string is the AAD for the sealed body.
    fn header_prefix(header: &EnvelopeHeader) -> Result<Vec<u8>, EnvelopeError> {
        let header_bytes = bincode::serialize(header)
            .map_err(|e| EnvelopeError::MalformedHeader(e.to_string()))?;

        let mut out = Vec::with_capacity(PREFIX_LEN + header_bytes.len());
        out.extend_from_slice(MAGIC);
        out.push(ENVELOPE_VERSION);
        out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&header_bytes);
        Ok(out)
    }
}
