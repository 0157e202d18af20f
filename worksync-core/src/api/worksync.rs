// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Worksync Orchestrator
//!
//! The top-level engine instance the surrounding application constructs
//! and holds. No process-wide singletons: everything the engine touches
//! (storage, keys, transports, events) is owned here and passed by
//! reference into each operation.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use super::config::{SyncSettingsUpdate, WorksyncConfig};
use super::error::{WorksyncError, WorksyncResult};
use super::events::{EventBus, EventHandler, SubscriberHandle, SyncEvent};
use crate::config::model::{ConfigSection, ConfigSnapshot};
use crate::config::store::ConfigStore;
use crate::crypto::keys::EncryptionManager;
use crate::pairing::{DevicePairingRegistry, PairingPayload, SyncDevice, TrustGrant};
use crate::storage::{SecureStorage, Storage, WorkspaceMeta};
use crate::sync::conflict::{ConflictDetector, ConflictResolution, SyncConflict};
use crate::sync::coordinator::{CycleContext, SyncCoordinator, SyncReport};
use crate::sync::envelope::{EnvelopeHeader, SyncEnvelope};
use crate::sync::state::SyncState;
use crate::transport::{SyncArchive, Transport, TransportManager};

use crate::storage::secure::entries::{
    DEVICE_SECRET as KEY_DEVICE_SECRET, SIGNING_SEED as KEY_SIGNING_SEED,
    STORAGE_KEY as KEY_STORAGE, SYNC_KEY as KEY_SYNC_KEY,
};

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The Worksync engine for one workspace.
pub struct Worksync {
    config: WorksyncConfig,
    meta: WorkspaceMeta,
    storage: Storage,
    secure: Box<dyn SecureStorage>,
    store: ConfigStore,
    encryption: EncryptionManager,
    registry: DevicePairingRegistry,
    transports: TransportManager,
    coordinator: SyncCoordinator,
    events: Arc<EventBus>,
}

impl Worksync {
    /// Opens (or creates on first run) the workspace engine.
    ///
    /// First run generates the workspace id, device keypairs and the
    /// initial sync key; later runs restore everything from storage and
    /// the platform's secure key store.
    pub fn initialize(
        config: WorksyncConfig,
        secure: Box<dyn SecureStorage>,
    ) -> WorksyncResult<Self> {
        let storage_key = Self::load_or_create_storage_key(secure.as_ref())?;

        let storage = match &config.storage_path {
            Some(path) => Storage::open(path, storage_key)?,
            None => Storage::in_memory(storage_key)?,
        };

        match storage.load_workspace_meta()? {
            Some(meta) => Self::restore(config, secure, storage, meta),
            None => Self::first_run(config, secure, storage),
        }
    }

    fn load_or_create_storage_key(
        secure: &dyn SecureStorage,
    ) -> WorksyncResult<crate::crypto::SymmetricKey> {
        if let Some(bytes) = secure.load_key(KEY_STORAGE)? {
            let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
                WorksyncError::Configuration("stored storage key has wrong length".into())
            })?;
            return Ok(crate::crypto::SymmetricKey::from_bytes(bytes));
        }
        let key = crate::crypto::SymmetricKey::generate();
        secure.save_key(KEY_STORAGE, key.as_bytes())?;
        Ok(key)
    }

    fn first_run(
        config: WorksyncConfig,
        secure: Box<dyn SecureStorage>,
        storage: Storage,
    ) -> WorksyncResult<Self> {
        let meta = WorkspaceMeta {
            workspace_id: Uuid::new_v4().to_string(),
            user_id: config.user_id.clone(),
            device_id: Uuid::new_v4().to_string(),
            device_name: config.device_name.clone(),
            created_at: current_timestamp(),
        };
        storage.save_workspace_meta(&meta)?;

        let mut encryption = EncryptionManager::new_workspace(&meta.device_id)?;
        encryption.configure(config.encryption_algorithm, config.kdf);
        encryption.set_rotation_policy(config.sync.key_rotation.clone());
        Self::persist_secrets(secure.as_ref(), &encryption)?;
        storage.save_encryption_material(&encryption.material(), encryption.epoch_floor())?;

        let registry = DevicePairingRegistry::new();
        storage.save_device_registry(&registry)?;

        let store = ConfigStore::new(&meta.device_id, &meta.user_id);
        storage.save_vector_clock(&store.clock())?;

        let coordinator = SyncCoordinator::new(&meta.workspace_id, config.sync.clone());

        tracing::info!(workspace = %meta.workspace_id, device = %meta.device_id, "workspace created");

        Ok(Worksync {
            config,
            meta,
            storage,
            secure,
            store,
            encryption,
            registry,
            transports: TransportManager::new(),
            coordinator,
            events: Arc::new(EventBus::new()),
        })
    }

    fn restore(
        config: WorksyncConfig,
        secure: Box<dyn SecureStorage>,
        storage: Storage,
        meta: WorkspaceMeta,
    ) -> WorksyncResult<Self> {
        let (material, epoch_floor) = storage
            .load_encryption_material()?
            .ok_or(WorksyncError::NotInitialized)?;

        let device_secret = Self::load_secret_32(secure.as_ref(), KEY_DEVICE_SECRET)?;
        let signing_seed = Self::load_secret_32(secure.as_ref(), KEY_SIGNING_SEED)?;
        let sync_key = match secure.load_key(KEY_SYNC_KEY)? {
            Some(bytes) => Some(bytes.try_into().map_err(|_| {
                WorksyncError::Configuration("stored sync key has wrong length".into())
            })?),
            None => None,
        };

        let encryption = EncryptionManager::restore(
            &meta.device_id,
            material,
            device_secret,
            signing_seed,
            sync_key,
            epoch_floor,
        )?;

        let registry = storage.load_device_registry()?.unwrap_or_default();

        let snapshot = storage.load_config_snapshot()?;
        let clock = storage.load_vector_clock()?.unwrap_or_default();
        let store = match snapshot {
            Some(snapshot) => ConfigStore::from_parts(
                &meta.device_id,
                &meta.user_id,
                snapshot.config,
                clock,
            ),
            None => ConfigStore::from_parts(
                &meta.device_id,
                &meta.user_id,
                Default::default(),
                clock,
            ),
        };

        let mut coordinator = SyncCoordinator::new(&meta.workspace_id, config.sync.clone());
        coordinator.refresh_state(&store, &storage)?;

        Ok(Worksync {
            config,
            meta,
            storage,
            secure,
            store,
            encryption,
            registry,
            transports: TransportManager::new(),
            coordinator,
            events: Arc::new(EventBus::new()),
        })
    }

    fn persist_secrets(
        secure: &dyn SecureStorage,
        encryption: &EncryptionManager,
    ) -> WorksyncResult<()> {
        secure.save_key(KEY_DEVICE_SECRET, &encryption.device_secret_bytes())?;
        secure.save_key(KEY_SIGNING_SEED, encryption.signing_keys().seed())?;
        if let Some(sync_key) = encryption.sync_key_bytes() {
            secure.save_key(KEY_SYNC_KEY, &sync_key)?;
        }
        Ok(())
    }

    fn load_secret_32(secure: &dyn SecureStorage, name: &str) -> WorksyncResult<[u8; 32]> {
        let bytes = secure
            .load_key(name)?
            .ok_or_else(|| WorksyncError::Configuration(format!("missing secret: {}", name)))?;
        bytes
            .try_into()
            .map_err(|_| WorksyncError::Configuration(format!("secret {} has wrong length", name)))
    }

    // === Reads ===

    /// Workspace and device identity.
    pub fn meta(&self) -> &WorkspaceMeta {
        &self.meta
    }

    /// Current sync state.
    pub fn sync_state(&self) -> SyncState {
        self.coordinator.state().clone()
    }

    /// Unresolved conflicts, oldest first.
    pub fn conflicts(&self) -> WorksyncResult<Vec<SyncConflict>> {
        Ok(self.storage.list_conflicts()?)
    }

    /// All paired devices.
    pub fn devices(&self) -> Vec<SyncDevice> {
        self.registry.devices().to_vec()
    }

    /// The config store (reads and local mutations).
    pub fn config_store(&self) -> &ConfigStore {
        &self.store
    }

    /// The event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Subscribes an event handler.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> SubscriberHandle {
        self.events.subscribe(handler)
    }

    /// Removes an event subscription.
    pub fn unsubscribe(&self, handle: SubscriberHandle) -> bool {
        self.events.unsubscribe(handle)
    }

    // === Configuration ===

    /// Applies a partial sync-settings update.
    pub fn update_sync_config(&mut self, update: SyncSettingsUpdate) -> WorksyncResult<()> {
        self.config.sync.apply(update);
        self.encryption
            .set_rotation_policy(self.config.sync.key_rotation.clone());
        self.coordinator.set_settings(self.config.sync.clone());
        self.storage
            .save_encryption_material(&self.encryption.material(), self.encryption.epoch_floor())?;
        Ok(())
    }

    /// Registers a transport for sync cycles.
    pub fn register_transport(&mut self, mut transport: Box<dyn Transport>) {
        transport.set_allow_list(self.registry.lan_allow_list());
        self.transports.register(transport);
    }

    /// Drops all registered transports.
    pub fn clear_transports(&mut self) {
        self.transports.clear();
    }

    // === Sync ===

    /// Runs a sync cycle now. Coalesces if one is already running.
    pub fn sync_now(&mut self) -> WorksyncResult<SyncReport> {
        self.transports.set_allow_list(self.registry.lan_allow_list());
        let report = self.coordinator.sync_now(CycleContext {
            store: &self.store,
            encryption: &mut self.encryption,
            transports: &mut self.transports,
            storage: &self.storage,
            secure: self.secure.as_ref(),
            registry: &mut self.registry,
            events: &self.events,
        })?;
        Ok(report)
    }

    /// Drives scheduled work (auto-sync, rotation checks).
    ///
    /// The application calls this from its single per-workspace timer.
    pub fn tick(&mut self) -> WorksyncResult<Option<SyncReport>> {
        let now = current_timestamp();
        let report = self.coordinator.tick(
            now,
            CycleContext {
                store: &self.store,
                encryption: &mut self.encryption,
                transports: &mut self.transports,
                storage: &self.storage,
                secure: self.secure.as_ref(),
                registry: &mut self.registry,
                events: &self.events,
            },
        )?;
        Ok(report)
    }

    /// Pauses sync.
    pub fn pause(&mut self) {
        self.coordinator.pause(&self.events);
    }

    /// Resumes sync.
    pub fn resume(&mut self) {
        self.coordinator.resume(&self.events);
    }

    /// Resolves a conflict with an explicit decision.
    pub fn resolve_conflict(
        &mut self,
        conflict_id: &str,
        resolution: ConflictResolution,
    ) -> WorksyncResult<SyncConflict> {
        let conflict = self.coordinator.resolve_conflict(
            CycleContext {
                store: &self.store,
                encryption: &mut self.encryption,
                transports: &mut self.transports,
                storage: &self.storage,
                secure: self.secure.as_ref(),
                registry: &mut self.registry,
                events: &self.events,
            },
            conflict_id,
            resolution,
        )?;
        Ok(conflict)
    }

    // === Pairing & trust ===

    /// Generates this device's pairing payload, to display on screen or
    /// render as a QR code on the device that wants to join.
    pub fn generate_pairing_payload(&self) -> PairingPayload {
        PairingPayload::generate(
            self.encryption.signing_keys(),
            &self.meta.device_id,
            &self.meta.device_name,
            self.config.device_type,
            &self.config.platform,
            self.encryption.device_public_key(),
            self.config
                .sync
                .transports
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
        )
    }

    /// Processes a scanned pairing payload, recording the device as
    /// paired-but-untrusted.
    pub fn process_pairing_payload(&mut self, json: &str) -> WorksyncResult<SyncDevice> {
        let payload = PairingPayload::from_json(json)?;
        let device = self
            .registry
            .process_payload(&payload, &self.meta.device_id)?
            .clone();
        self.storage.save_device_registry(&self.registry)?;
        self.events.dispatch(SyncEvent::DevicePaired {
            device_id: device.id.clone(),
        });
        tracing::info!(device = %device.id, name = %device.name, "device paired (untrusted)");
        Ok(device)
    }

    /// Grants trust to a paired device: wraps the workspace sync key for
    /// it and admits it to the LAN allow-list. This is the explicit user
    /// action that flips `trusted` to true.
    ///
    /// Deliver the returned grant to the device (pairing archive or LAN).
    pub fn register_device(&mut self, device_id: &str) -> WorksyncResult<TrustGrant> {
        let device = self.registry.trust_device(device_id)?;
        let public_key = device.public_key;
        let wrapped = self.encryption.wrap_key_for(device_id, &public_key)?;

        self.storage.save_device_registry(&self.registry)?;
        self.storage
            .save_encryption_material(&self.encryption.material(), self.encryption.epoch_floor())?;
        self.transports.set_allow_list(self.registry.lan_allow_list());

        self.events.dispatch(SyncEvent::DeviceTrusted {
            device_id: device_id.to_string(),
        });
        tracing::info!(device = %device_id, "device trusted");

        Ok(TrustGrant {
            device_id: device_id.to_string(),
            wrapped_key: wrapped,
            granted_at: current_timestamp(),
        })
    }

    /// Installs a trust grant addressed to this device.
    ///
    /// Used on first join, and to recover after missing a rotation while
    /// offline (the repair path).
    pub fn install_trust_grant(&mut self, grant: &TrustGrant) -> WorksyncResult<()> {
        if grant.device_id != self.meta.device_id {
            return Err(WorksyncError::InvalidState(format!(
                "trust grant addressed to {}",
                grant.device_id
            )));
        }
        self.encryption.install_wrapped_key(&grant.wrapped_key)?;
        Self::persist_secrets(self.secure.as_ref(), &self.encryption)?;
        self.storage
            .save_encryption_material(&self.encryption.material(), self.encryption.epoch_floor())?;
        self.coordinator.clear_repair();
        tracing::info!(epoch = self.encryption.epoch(), "trust grant installed");
        Ok(())
    }

    /// Removes a device and rotates the workspace key without it.
    ///
    /// Rotation is part of removal, not a follow-up: the call fails if the
    /// new key cannot be wrapped for the remaining trusted set, and the
    /// removed device can never decrypt an envelope sealed after this.
    pub fn remove_device(&mut self, device_id: &str) -> WorksyncResult<SyncDevice> {
        let removed = self.registry.remove_device(device_id)?;
        self.encryption.discard_wrap(device_id);

        let trusted = self.registry.trusted_keys();
        let epoch = self.encryption.rotate(&trusted)?;
        Self::persist_secrets(self.secure.as_ref(), &self.encryption)?;

        self.storage.save_device_registry(&self.registry)?;
        self.storage
            .save_encryption_material(&self.encryption.material(), self.encryption.epoch_floor())?;
        self.transports.set_allow_list(self.registry.lan_allow_list());

        self.events.dispatch(SyncEvent::DeviceRemoved {
            device_id: device_id.to_string(),
        });
        self.events.dispatch(SyncEvent::KeyRotated { epoch });
        tracing::info!(device = %device_id, epoch, "device removed, key rotated");

        Ok(removed)
    }

    /// Rotates the workspace key for all currently trusted devices.
    pub fn rotate_encryption_key(&mut self) -> WorksyncResult<u64> {
        let trusted = self.registry.trusted_keys();
        let epoch = self.encryption.rotate(&trusted)?;
        Self::persist_secrets(self.secure.as_ref(), &self.encryption)?;
        self.storage
            .save_encryption_material(&self.encryption.material(), self.encryption.epoch_floor())?;
        self.events.dispatch(SyncEvent::KeyRotated { epoch });
        Ok(epoch)
    }

    // === Archives ===

    /// Exports the current config as a passphrase-protected archive.
    ///
    /// With `grant_for`, the archive also carries a trust grant so the
    /// named (already trusted) device can bootstrap from it.
    pub fn export_archive(
        &mut self,
        passphrase: &str,
        grant_for: Option<&str>,
    ) -> WorksyncResult<SyncArchive> {
        let snapshot = self.store.snapshot();
        let payload = snapshot.to_payload()?;
        let header = EnvelopeHeader {
            workspace_id: self.meta.workspace_id.clone(),
            sender_device_id: self.meta.device_id.clone(),
            vector_clock: snapshot.clock.clone(),
            epoch: self.encryption.epoch(),
            key_wraps: self.encryption.wraps(),
        };
        let envelope = SyncEnvelope::seal(&self.encryption, header, &payload)?;

        let grant = match grant_for {
            Some(device_id) => {
                let device = self
                    .registry
                    .find(device_id)
                    .ok_or_else(|| {
                        WorksyncError::Pairing(crate::pairing::PairingError::DeviceNotFound(
                            device_id.to_string(),
                        ))
                    })?
                    .clone();
                if !device.trusted {
                    return Err(WorksyncError::Pairing(
                        crate::pairing::PairingError::NotTrusted(device_id.to_string()),
                    ));
                }
                let wrapped = self.encryption.wrap_key_for(device_id, &device.public_key)?;
                Some(TrustGrant {
                    device_id: device_id.to_string(),
                    wrapped_key: wrapped,
                    granted_at: current_timestamp(),
                })
            }
            None => None,
        };

        Ok(SyncArchive::seal(
            &envelope,
            grant,
            passphrase,
            self.encryption.kdf(),
        )?)
    }

    /// Imports an archive: installs a trust grant addressed to us (if
    /// any), then merges the carried envelope like any other inbound
    /// envelope.
    pub fn import_archive(
        &mut self,
        archive: &SyncArchive,
        passphrase: &str,
    ) -> WorksyncResult<SyncReport> {
        let (envelope, grant) = SyncArchive::open(archive.as_bytes(), passphrase)?;

        if envelope.header.workspace_id != self.meta.workspace_id {
            // First import into a fresh workspace adopts the archive's id.
            if self.store.snapshot().clock.is_empty() && self.registry.devices().is_empty() {
                self.meta.workspace_id = envelope.header.workspace_id.clone();
                self.storage.save_workspace_meta(&self.meta)?;
                self.coordinator = SyncCoordinator::new(
                    &self.meta.workspace_id,
                    self.config.sync.clone(),
                );
            } else {
                return Err(WorksyncError::InvalidState(
                    "archive belongs to a different workspace".into(),
                ));
            }
        }

        if let Some(grant) = grant {
            if grant.device_id == self.meta.device_id {
                self.install_trust_grant(&grant)?;
            }
        }

        self.merge_remote_envelope(&envelope)
    }

    /// Opens and merges one envelope outside a transport cycle.
    fn merge_remote_envelope(&mut self, envelope: &SyncEnvelope) -> WorksyncResult<SyncReport> {
        let plaintext = envelope.open(&mut self.encryption)?;
        let remote: ConfigSnapshot = ConfigSnapshot::from_payload(&plaintext)?;

        let local = self.store.snapshot();
        let detector = ConflictDetector::new(self.config.sync.conflict_resolution);
        let outcome = detector.merge(&local, &remote);

        self.store.replace(outcome.snapshot.clone());
        self.storage.save_config_snapshot(&outcome.snapshot)?;
        self.storage.save_vector_clock(&outcome.snapshot.clock)?;
        let new_conflicts = outcome.conflicts.len();
        for conflict in &outcome.conflicts {
            self.storage.save_conflict(conflict)?;
            self.events.dispatch(SyncEvent::ConflictDetected {
                conflict_id: conflict.id.clone(),
                path: conflict.path.clone(),
            });
        }
        self.registry
            .touch(&envelope.header.sender_device_id, current_timestamp());
        self.storage.save_device_registry(&self.registry)?;
        self.storage
            .save_encryption_material(&self.encryption.material(), self.encryption.epoch_floor())?;
        self.coordinator.refresh_state(&self.store, &self.storage)?;

        Ok(SyncReport::Completed {
            took_remote: outcome.took_remote,
            envelopes: 1,
            new_conflicts,
        })
    }

    // === Cloud credentials ===

    /// Stores provider credentials, sealed with the storage key.
    pub fn set_cloud_credentials(
        &mut self,
        credentials: &crate::transport::CloudCredentials,
    ) -> WorksyncResult<()> {
        let sealed = credentials.seal(&self.storage.encryption_key)?;
        self.storage
            .save_cloud_credentials(&credentials.provider, &sealed)?;
        Ok(())
    }

    /// Loads provider credentials.
    pub fn cloud_credentials(
        &self,
        provider: &str,
    ) -> WorksyncResult<Option<crate::transport::CloudCredentials>> {
        match self.storage.load_cloud_credentials(provider)? {
            Some(sealed) => Ok(Some(crate::transport::CloudCredentials::open(
                &self.storage.encryption_key,
                provider,
                &sealed,
            )?)),
            None => Ok(None),
        }
    }

    // === Local edits ===

    /// Writes a config value, bumping the local clock entry.
    pub fn set_config_value(
        &mut self,
        section: ConfigSection,
        path: &str,
        value: serde_json::Value,
    ) -> WorksyncResult<()> {
        self.store.set_value(section, path, value)?;
        self.storage.save_vector_clock(&self.store.clock())?;
        self.coordinator.refresh_state(&self.store, &self.storage)?;
        Ok(())
    }

    /// Reads a config value.
    pub fn get_config_value(
        &self,
        section: ConfigSection,
        path: &str,
    ) -> Option<serde_json::Value> {
        self.store.get_value(section, path)
    }
}
