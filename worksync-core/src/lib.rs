// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Worksync Core Library
//!
//! Local-first encrypted workspace-configuration sync. Vector clocks track
//! causality between devices, a per-workspace symmetric key (individually
//! wrapped for each trusted device) protects every envelope, and cloud
//! folder / LAN peer / archive transports move ciphertext only.
//! All cryptographic primitives come from the audited `ring` crate except
//! XChaCha20-Poly1305 and Argon2id, the two documented exceptions.

pub mod api;
pub mod config;
pub mod crypto;
pub mod pairing;
pub mod storage;
pub mod sync;
pub mod transport;

pub use api::{
    CallbackHandler, EventBus, EventHandler, SubscriberHandle, SyncEvent, SyncSettings,
    SyncSettingsUpdate, Worksync, WorksyncConfig, WorksyncError, WorksyncResult,
};
pub use config::{
    ConfigSection, ConfigSnapshot, ConfigStore, LastModified, ValidationError, WorkspaceConfig,
};
pub use crypto::{
    DecryptionError, EncryptionAlgorithm, EncryptionManager, EncryptionMaterial, KdfAlgorithm,
    KeyRotationPolicy, SymmetricKey, WrappedKey,
};
pub use pairing::{DevicePairingRegistry, DeviceType, PairingError, PairingPayload, SyncDevice, TrustGrant};
pub use storage::{
    FileKeyStorage, MemoryKeyStorage, SecureStorage, Storage, StorageError, WorkspaceMeta,
};
pub use sync::{
    ClockOrdering, ConflictDetector, ConflictPolicy, ConflictResolution, SyncConflict,
    SyncCoordinator, SyncEnvelope, SyncError, SyncReport, SyncState, SyncStatus, VectorClock,
};
pub use transport::{
    BlobStore, CloudCredentials, CloudTransport, DirBlobStore, ImportExportTransport,
    LanTransport, MemoryTransport, SharedBlob, SyncArchive, Transport, TransportError,
    TransportKind, TransportManager,
};
