// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Import/Export Archives
//!
//! User-triggered encrypted archives for fully offline bridging and
//! first-pairing bootstrap. The archive carries the standard sync envelope
//! (and, for bootstrap, a trust grant with the wrapped sync key), sealed
//! under a passphrase-derived key.
//!
//! Archive format: `WSAR || version (1) || kdf_tag (1) || salt (16)
//!                  || sealed contents`
//! The cleartext prefix is the AAD for the sealed contents.

use std::path::{Path, PathBuf};

use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use zxcvbn::Score;

use super::{Transport, TransportError, TransportKind, TransportResult};
use crate::crypto::{self, password_kdf, KdfAlgorithm};
use crate::pairing::TrustGrant;
use crate::sync::envelope::SyncEnvelope;

/// Archive magic bytes.
const MAGIC: &[u8; 4] = b"WSAR";

/// Archive format version.
const ARCHIVE_VERSION: u8 = 1;

/// Salt length for the passphrase KDF.
const SALT_LEN: usize = 16;

/// Minimum zxcvbn score for archive passphrases (0-4 scale).
const MIN_PASSPHRASE_SCORE: Score = Score::Three;

/// KDF tag for Argon2id.
const KDF_TAG_ARGON2ID: u8 = 0x01;
/// KDF tag for PBKDF2-HMAC-SHA256.
const KDF_TAG_PBKDF2: u8 = 0x02;

fn kdf_tag(kdf: KdfAlgorithm) -> u8 {
    match kdf {
        KdfAlgorithm::Argon2id => KDF_TAG_ARGON2ID,
        KdfAlgorithm::Pbkdf2 => KDF_TAG_PBKDF2,
    }
}

fn kdf_from_tag(tag: u8) -> Option<KdfAlgorithm> {
    match tag {
        KDF_TAG_ARGON2ID => Some(KdfAlgorithm::Argon2id),
        KDF_TAG_PBKDF2 => Some(KdfAlgorithm::Pbkdf2),
        _ => None,
    }
}

/// What an archive carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ArchiveContents {
    /// Encoded sync envelope.
    envelope: Vec<u8>,
    /// Wrapped sync key for a bootstrapping device, when this archive
    /// completes a pairing.
    trust_grant: Option<TrustGrant>,
}

/// A passphrase-protected envelope archive.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncArchive {
    bytes: Vec<u8>,
}

impl SyncArchive {
    /// Seals an envelope (and optional trust grant) under a passphrase.
    ///
    /// Rejects passphrases scoring below 3/4 on zxcvbn.
    pub fn seal(
        envelope: &SyncEnvelope,
        trust_grant: Option<TrustGrant>,
        passphrase: &str,
        kdf: KdfAlgorithm,
    ) -> TransportResult<Self> {
        let estimate = zxcvbn::zxcvbn(passphrase, &[]);
        if estimate.score() < MIN_PASSPHRASE_SCORE {
            return Err(TransportError::WeakPassphrase(
                "archive passphrase must score at least 3/4".into(),
            ));
        }

        let rng = SystemRandom::new();
        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt)
            .map_err(|_| TransportError::Archive("RNG failure".into()))?;

        let mut prefix = Vec::with_capacity(4 + 2 + SALT_LEN);
        prefix.extend_from_slice(MAGIC);
        prefix.push(ARCHIVE_VERSION);
        prefix.push(kdf_tag(kdf));
        prefix.extend_from_slice(&salt);

        let contents = ArchiveContents {
            envelope: envelope.encode().map_err(TransportError::Envelope)?,
            trust_grant,
        };
        let plaintext =
            bincode::serialize(&contents).map_err(|e| TransportError::Archive(e.to_string()))?;

        let key = password_kdf::derive_key(kdf, passphrase.as_bytes(), &salt)
            .map_err(|e| TransportError::Archive(e.to_string()))?;
        let sealed = crypto::encrypt(&key, crypto::EncryptionAlgorithm::default(), &plaintext, &prefix)
            .map_err(|e| TransportError::Archive(e.to_string()))?;

        let mut bytes = prefix;
        bytes.extend_from_slice(&sealed);
        Ok(SyncArchive { bytes })
    }

    /// Opens an archive with the passphrase.
    pub fn open(
        bytes: &[u8],
        passphrase: &str,
    ) -> TransportResult<(SyncEnvelope, Option<TrustGrant>)> {
        let prefix_len = 4 + 2 + SALT_LEN;
        if bytes.len() < prefix_len {
            return Err(TransportError::Archive("archive too short".into()));
        }
        if &bytes[0..4] != MAGIC {
            return Err(TransportError::Archive("not a sync archive".into()));
        }
        if bytes[4] != ARCHIVE_VERSION {
            return Err(TransportError::Archive(format!(
                "unsupported archive version {}",
                bytes[4]
            )));
        }
        let kdf = kdf_from_tag(bytes[5])
            .ok_or_else(|| TransportError::Archive(format!("unknown KDF tag {:#04x}", bytes[5])))?;
        let salt = &bytes[6..prefix_len];

        let key = password_kdf::derive_key(kdf, passphrase.as_bytes(), salt)
            .map_err(|e| TransportError::Archive(e.to_string()))?;
        let plaintext = crypto::decrypt(&key, &bytes[prefix_len..], &bytes[..prefix_len])
            .map_err(|_| TransportError::Archive("wrong passphrase or corrupted archive".into()))?;

        let contents: ArchiveContents =
            bincode::deserialize(&plaintext).map_err(|e| TransportError::Archive(e.to_string()))?;
        let envelope = SyncEnvelope::decode(&contents.envelope)?;
        Ok((envelope, contents.trust_grant))
    }

    /// The raw archive bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Wraps existing archive bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        SyncArchive { bytes }
    }

    /// Writes the archive to a file.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> TransportResult<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Reads an archive from a file.
    pub fn read_from<P: AsRef<Path>>(path: P) -> TransportResult<Self> {
        Ok(SyncArchive {
            bytes: std::fs::read(path)?,
        })
    }
}

/// Archive-based transport for offline bridging between trusted devices.
///
/// Upload writes `<dir>/<workspace_id>.wsarc`; download reads it back.
/// The passphrase is agreed between the user's own devices out-of-band.
pub struct ImportExportTransport {
    workspace_id: String,
    dir: PathBuf,
    passphrase: String,
    kdf: KdfAlgorithm,
}

impl ImportExportTransport {
    /// Creates a transport writing archives into `dir`.
    pub fn new<P: AsRef<Path>>(
        workspace_id: &str,
        dir: P,
        passphrase: &str,
        kdf: KdfAlgorithm,
    ) -> Self {
        ImportExportTransport {
            workspace_id: workspace_id.to_string(),
            dir: dir.as_ref().to_path_buf(),
            passphrase: passphrase.to_string(),
            kdf,
        }
    }

    fn archive_path(&self) -> PathBuf {
        self.dir.join(format!("{}.wsarc", self.workspace_id))
    }
}

impl Transport for ImportExportTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ImportExport
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }

    fn upload_configuration(&mut self, envelope: &SyncEnvelope) -> TransportResult<()> {
        let archive = SyncArchive::seal(envelope, None, &self.passphrase, self.kdf)?;
        archive.write_to(self.archive_path())
    }

    fn download_configuration(&mut self) -> TransportResult<Option<SyncEnvelope>> {
        let path = self.archive_path();
        if !path.exists() {
            return Ok(None);
        }
        let archive = SyncArchive::read_from(&path)?;
        let (envelope, _) = SyncArchive::open(archive.as_bytes(), &self.passphrase)?;
        Ok(Some(envelope))
    }
}
