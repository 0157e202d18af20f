// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Coordinator
//!
//! Runs a sync cycle end-to-end and is the only mutator of [`SyncState`]:
//! snapshot, seal, upload, download, open, merge, atomic apply. Transport
//! errors retry with exponential backoff up to the configured budget;
//! decryption and validation failures are fatal for the cycle and never
//! auto-retried. Overlapping cycle requests coalesce into the running one.

use std::collections::BTreeSet;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use thiserror::Error;

use super::clock::VectorClock;
use super::conflict::{ConflictDetector, ConflictResolution, SyncConflict};
use super::envelope::{EnvelopeError, EnvelopeHeader, SyncEnvelope};
use super::state::{SyncState, SyncStatus};
use crate::api::config::SyncSettings;
use crate::api::events::{EventBus, SyncEvent};
use crate::config::model::{ConfigSnapshot, ValidationError};
use crate::config::store::ConfigStore;
use crate::crypto::keys::{DecryptionError, EncryptionManager, KeyError};
use crate::pairing::DevicePairingRegistry;
use crate::storage::{SecureStorage, Storage, StorageError};
use crate::transport::{TransportError, TransportManager};

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Sync cycle error types.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decryption error: {0}")]
    Decryption(#[from] DecryptionError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Conflict not found: {0}")]
    ConflictNotFound(String),

    #[error("Conflict already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Sync is paused")]
    Paused,
}

/// What a finished cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReport {
    /// The cycle ran to completion.
    Completed {
        /// Whether remote data was applied.
        took_remote: bool,
        /// Envelopes merged this cycle.
        envelopes: usize,
        /// Conflicts produced this cycle.
        new_conflicts: usize,
    },
    /// A cycle was already running; this request was a no-op.
    Coalesced,
}

/// Everything a cycle borrows from the engine.
///
/// The coordinator owns state and scheduling; keys, transports, storage
/// and the registry are owned by the engine and lent per cycle so no two
/// components hold overlapping mutable state between cycles.
pub struct CycleContext<'a> {
    pub store: &'a ConfigStore,
    pub encryption: &'a mut EncryptionManager,
    pub transports: &'a mut TransportManager,
    pub storage: &'a Storage,
    pub secure: &'a dyn SecureStorage,
    pub registry: &'a mut DevicePairingRegistry,
    pub events: &'a EventBus,
}

/// Orchestrates sync cycles for one workspace.
pub struct SyncCoordinator {
    workspace_id: String,
    settings: SyncSettings,
    state: SyncState,
    /// Coalescing guard: a cycle is in flight.
    in_cycle: bool,
    /// Unix timestamp of the next automatic cycle.
    next_auto_sync: u64,
}

impl SyncCoordinator {
    /// Creates a coordinator.
    pub fn new(workspace_id: &str, settings: SyncSettings) -> Self {
        let next_auto_sync = current_timestamp() + settings.sync_interval_secs;
        SyncCoordinator {
            workspace_id: workspace_id.to_string(),
            settings,
            state: SyncState::default(),
            in_cycle: false,
            next_auto_sync,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Current settings.
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Replaces the settings (from `update_sync_config`).
    pub fn set_settings(&mut self, settings: SyncSettings) {
        self.settings = settings;
    }

    /// Pauses sync; cycles and the auto timer are disabled until resume.
    pub fn pause(&mut self, events: &EventBus) {
        if self.state.status != SyncStatus::Paused {
            self.state.status = SyncStatus::Paused;
            events.dispatch(SyncEvent::StatusChanged {
                status: SyncStatus::Paused,
            });
        }
    }

    /// Resumes sync after a pause.
    pub fn resume(&mut self, events: &EventBus) {
        if self.state.status == SyncStatus::Paused {
            self.state.status = SyncStatus::Idle;
            events.dispatch(SyncEvent::StatusChanged {
                status: SyncStatus::Idle,
            });
        }
    }

    /// Runs scheduled work: the auto-sync interval and the rotation-due
    /// check. Call periodically from the application's single timer.
    pub fn tick(
        &mut self,
        now: u64,
        mut ctx: CycleContext<'_>,
    ) -> Result<Option<SyncReport>, SyncError> {
        if self.state.status == SyncStatus::Paused {
            return Ok(None);
        }

        if ctx.encryption.rotation_due(now) {
            let trusted = ctx.registry.trusted_keys();
            let epoch = ctx.encryption.rotate(&trusted)?;
            if let Some(sync_key) = ctx.encryption.sync_key_bytes() {
                ctx.secure
                    .save_key(crate::storage::secure::entries::SYNC_KEY, &sync_key)?;
            }
            ctx.storage
                .save_encryption_material(&ctx.encryption.material(), ctx.encryption.epoch_floor())?;
            ctx.events.dispatch(SyncEvent::KeyRotated { epoch });
        }

        if self.settings.auto_sync && now >= self.next_auto_sync {
            self.next_auto_sync = now + self.settings.sync_interval_secs;
            return self.sync_now(ctx).map(Some);
        }

        Ok(None)
    }

    /// Runs one sync cycle.
    ///
    /// A request while a cycle is already in flight is coalesced, not
    /// queued: overlapping merges would corrupt clock bookkeeping.
    pub fn sync_now(&mut self, mut ctx: CycleContext<'_>) -> Result<SyncReport, SyncError> {
        if self.state.status == SyncStatus::Paused {
            return Err(SyncError::Paused);
        }
        if self.in_cycle {
            return Ok(SyncReport::Coalesced);
        }

        self.in_cycle = true;
        self.state.status = SyncStatus::Syncing;
        ctx.events.dispatch(SyncEvent::SyncStarted);
        ctx.events.dispatch(SyncEvent::StatusChanged {
            status: SyncStatus::Syncing,
        });
        let started = Instant::now();

        let result = self.run_cycle(&mut ctx);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        self.in_cycle = false;
        match result {
            Ok(report) => {
                self.state.status = SyncStatus::Idle;
                self.state.last_sync = Some(current_timestamp());
                self.state.last_error = None;
                self.state.stats.record_success(elapsed_ms);
                self.state.pending_changes = ctx.store.pending_changes();
                self.state.vector_clock = ctx.store.clock();
                self.state.conflicts = ctx.storage.count_conflicts()?;

                if let SyncReport::Completed {
                    took_remote,
                    new_conflicts,
                    ..
                } = &report
                {
                    ctx.events.dispatch(SyncEvent::SyncCompleted {
                        took_remote: *took_remote,
                        new_conflicts: *new_conflicts,
                    });
                }
                ctx.events.dispatch(SyncEvent::StatusChanged {
                    status: SyncStatus::Idle,
                });
                Ok(report)
            }
            Err(error) => {
                self.state.status = SyncStatus::Error;
                self.state.last_error = Some(error.to_string());
                self.state.stats.record_failure(elapsed_ms);
                self.state.pending_changes = ctx.store.pending_changes();
                self.state.vector_clock = ctx.store.clock();

                if let SyncError::Decryption(ref e) = error {
                    // Wrong key, rollback attempt or a missed rotation:
                    // user action required, never silently retried.
                    self.state.needs_repair = true;
                    ctx.events.dispatch(SyncEvent::RepairRequired {
                        reason: e.to_string(),
                    });
                }

                tracing::error!(error = %error, "sync cycle failed");
                ctx.events.dispatch(SyncEvent::SyncFailed {
                    error: error.to_string(),
                });
                ctx.events.dispatch(SyncEvent::StatusChanged {
                    status: SyncStatus::Error,
                });
                Err(error)
            }
        }
    }

    /// The cycle body. Applies nothing until every envelope has been
    /// opened, validated and merged; a failure anywhere leaves the
    /// pre-cycle snapshot in place.
    fn run_cycle(&mut self, ctx: &mut CycleContext<'_>) -> Result<SyncReport, SyncError> {
        let pre = ctx.store.snapshot();
        tracing::debug!(
            workspace = %self.workspace_id,
            pending = ctx.store.pending_changes(),
            "sync cycle started"
        );

        // Seal the local snapshot. The header carries the current wrap set
        // so peers that missed a rotation can catch up from this envelope.
        let payload = pre.to_payload()?;
        let header = EnvelopeHeader {
            workspace_id: self.workspace_id.clone(),
            sender_device_id: ctx.store.device_id().to_string(),
            vector_clock: pre.clock.clone(),
            epoch: ctx.encryption.epoch(),
            key_wraps: ctx.encryption.wraps(),
        };
        let envelope = SyncEnvelope::seal(ctx.encryption, header, &payload)?;

        // Upload with bounded exponential backoff for transient errors.
        self.upload_with_retry(ctx, &envelope)?;

        // Download from every reachable transport.
        let (incoming, download_errors) = ctx.transports.download();
        if incoming.is_empty() {
            if let Some(error) = download_errors.into_iter().next() {
                return Err(SyncError::Transport(error));
            }
        }

        // Open and validate everything before touching local state.
        let own_device_id = ctx.store.device_id().to_string();
        let mut remote_snapshots = Vec::new();
        for envelope in &incoming {
            if envelope.header.workspace_id != self.workspace_id
                || envelope.header.sender_device_id == own_device_id
            {
                continue;
            }

            if envelope.header.epoch > ctx.encryption.epoch() {
                self.adopt_wrap_from_header(ctx, envelope)?;
            }

            let plaintext = match envelope.open(ctx.encryption) {
                Ok(plaintext) => plaintext,
                Err(DecryptionError::EpochRollback { envelope: e, floor }) => {
                    // The sender is behind our key generation; it will hit
                    // its own stale-key state when it sees our envelope.
                    // Rejecting just this envelope is the anti-rollback
                    // guarantee; our cycle continues.
                    tracing::warn!(
                        sender = %envelope.header.sender_device_id,
                        envelope_epoch = e,
                        floor,
                        "rejected stale-epoch envelope"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let snapshot = ConfigSnapshot::from_payload(&plaintext)?;
            remote_snapshots.push((envelope.header.sender_device_id.clone(), snapshot));
        }

        // Merge all inbound snapshots uniformly, regardless of transport.
        let detector = ConflictDetector::new(self.settings.conflict_resolution);
        let mut merged = pre.clone();
        let mut new_conflicts: Vec<SyncConflict> = Vec::new();
        let mut took_remote = false;
        let now = current_timestamp();
        for (sender, snapshot) in &remote_snapshots {
            let outcome = detector.merge(&merged, snapshot);
            merged = outcome.snapshot;
            took_remote |= outcome.took_remote;
            new_conflicts.extend(outcome.conflicts);
            ctx.registry.touch(sender, now);
        }

        // Drop conflicts identical to ones already awaiting resolution.
        let existing = ctx.storage.list_conflicts()?;
        let existing_keys: BTreeSet<(String, String, String)> = existing
            .iter()
            .map(|c| {
                (
                    c.path.clone(),
                    c.local.value.to_string(),
                    c.remote.value.to_string(),
                )
            })
            .collect();
        new_conflicts.retain(|c| {
            !existing_keys.contains(&(
                c.path.clone(),
                c.local.value.to_string(),
                c.remote.value.to_string(),
            ))
        });

        // Atomic apply: swap the merged snapshot in, then persist.
        ctx.store.replace(merged.clone());
        ctx.store.mark_synced();
        ctx.storage.save_config_snapshot(&merged)?;
        ctx.storage.save_vector_clock(&merged.clock)?;
        for conflict in &new_conflicts {
            ctx.storage.save_conflict(conflict)?;
            ctx.events.dispatch(SyncEvent::ConflictDetected {
                conflict_id: conflict.id.clone(),
                path: conflict.path.clone(),
            });
        }
        if !remote_snapshots.is_empty() {
            ctx.storage.save_device_registry(ctx.registry)?;
        }
        ctx.storage
            .save_encryption_material(&ctx.encryption.material(), ctx.encryption.epoch_floor())?;

        tracing::info!(
            envelopes = remote_snapshots.len(),
            took_remote,
            conflicts = new_conflicts.len(),
            "sync cycle completed"
        );

        Ok(SyncReport::Completed {
            took_remote,
            envelopes: remote_snapshots.len(),
            new_conflicts: new_conflicts.len(),
        })
    }

    /// Installs our wrap from a newer-epoch envelope header, if present.
    ///
    /// Only wraps produced by a device we already trust are accepted; an
    /// attacker cannot use the recovery path to swap in a key of their
    /// choosing. When no acceptable wrap exists the subsequent open fails
    /// with `StaleLocalKey` and the re-pairing state surfaces.
    fn adopt_wrap_from_header(
        &mut self,
        ctx: &mut CycleContext<'_>,
        envelope: &SyncEnvelope,
    ) -> Result<(), SyncError> {
        let own_device_id = ctx.store.device_id();
        let wrap = match envelope
            .header
            .key_wraps
            .iter()
            .find(|w| w.device_id == own_device_id && w.epoch == envelope.header.epoch)
        {
            Some(wrap) => wrap,
            None => return Ok(()),
        };

        let sender_trusted = ctx
            .registry
            .find(&envelope.header.sender_device_id)
            .map(|d| d.trusted && d.public_key == wrap.wrapped_by)
            .unwrap_or(false);
        if !sender_trusted {
            tracing::warn!(
                sender = %envelope.header.sender_device_id,
                "ignoring key wrap from untrusted sender"
            );
            return Ok(());
        }

        ctx.encryption.install_wrapped_key(wrap)?;
        if let Some(sync_key) = ctx.encryption.sync_key_bytes() {
            ctx.secure
                .save_key(crate::storage::secure::entries::SYNC_KEY, &sync_key)?;
        }
        ctx.storage
            .save_encryption_material(&ctx.encryption.material(), ctx.encryption.epoch_floor())?;
        self.state.needs_repair = false;
        tracing::info!(epoch = envelope.header.epoch, "adopted rotated key from envelope");
        Ok(())
    }

    fn upload_with_retry(
        &self,
        ctx: &mut CycleContext<'_>,
        envelope: &SyncEnvelope,
    ) -> Result<(), SyncError> {
        let mut attempt = 0u32;
        loop {
            match ctx.transports.upload(envelope) {
                Ok(_) => return Ok(()),
                Err(error) if error.is_retryable() && attempt < self.settings.max_retries => {
                    let delay = self.settings.retry_base_delay_ms * (1 << attempt.min(6));
                    tracing::warn!(attempt, delay_ms = delay, error = %error, "upload retry");
                    std::thread::sleep(Duration::from_millis(delay));
                    attempt += 1;
                }
                Err(error) => return Err(SyncError::Transport(error)),
            }
        }
    }

    /// Resolves a stored conflict with an explicit decision.
    ///
    /// The decision is applied as a local mutation (bumping only this
    /// device's clock entry) and the conflict record is deleted.
    pub fn resolve_conflict(
        &mut self,
        ctx: CycleContext<'_>,
        conflict_id: &str,
        resolution: ConflictResolution,
    ) -> Result<SyncConflict, SyncError> {
        let mut conflict = ctx
            .storage
            .load_conflict(conflict_id)?
            .ok_or_else(|| SyncError::ConflictNotFound(conflict_id.to_string()))?;
        if conflict.is_resolved() {
            return Err(SyncError::AlreadyResolved(conflict_id.to_string()));
        }

        let value = conflict.resolve(resolution);
        ctx.store.apply_section(conflict.conflict_type, value);
        ctx.storage.save_config_snapshot(&ctx.store.snapshot())?;
        ctx.storage.save_vector_clock(&ctx.store.clock())?;
        ctx.storage.delete_conflict(conflict_id)?;

        self.state.conflicts = ctx.storage.count_conflicts()?;
        self.state.pending_changes = ctx.store.pending_changes();
        self.state.vector_clock = ctx.store.clock();
        ctx.events.dispatch(SyncEvent::ConflictResolved {
            conflict_id: conflict_id.to_string(),
        });

        Ok(conflict)
    }

    /// Refreshes derived state fields after out-of-cycle mutations.
    pub fn refresh_state(&mut self, store: &ConfigStore, storage: &Storage) -> Result<(), SyncError> {
        self.state.pending_changes = store.pending_changes();
        self.state.vector_clock = store.clock();
        self.state.conflicts = storage.count_conflicts()?;
        Ok(())
    }

    /// Clears the repair flag once the device has re-validated trust.
    pub fn clear_repair(&mut self) {
        self.state.needs_repair = false;
    }

    /// The local clock, as last observed by the coordinator.
    pub fn vector_clock(&self) -> &VectorClock {
        &self.state.vector_clock
    }

    /// Used by tests to pin the next auto-sync instant.
    pub fn set_next_auto_sync(&mut self, at: u64) {
        self.next_auto_sync = at;
    }
}
