// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Shared fixtures for integration tests: engine construction, device
//! linking and transport wiring.

use std::sync::Arc;

use worksync_core::storage::MemoryKeyStorage;
use worksync_core::transport::SharedBlob;
use worksync_core::{MemoryTransport, SyncSettings, Worksync, WorksyncConfig};

/// Strong enough to pass the zxcvbn gate on archive export.
pub const ARCHIVE_PASSPHRASE: &str = "correct-horse-battery-staple";

/// Builds an in-memory engine with fast retries for tests.
pub fn build_engine(user_id: &str, device_name: &str) -> Worksync {
    let config = WorksyncConfig {
        storage_path: None,
        user_id: user_id.to_string(),
        device_name: device_name.to_string(),
        sync: SyncSettings {
            retry_base_delay_ms: 1,
            ..SyncSettings::default()
        },
        ..WorksyncConfig::default()
    };
    Worksync::initialize(config, Box::new(MemoryKeyStorage::new()))
        .expect("engine construction should succeed")
}

/// Pairs and mutually trusts two engines, bootstrapping `b` from `a`'s
/// archive so both share the workspace id and sync key.
pub fn link_devices(a: &mut Worksync, b: &mut Worksync) {
    let b_id = b.meta().device_id.clone();
    let b_payload = b
        .generate_pairing_payload()
        .to_json()
        .expect("payload serializes");
    a.process_pairing_payload(&b_payload).expect("pairing");
    a.register_device(&b_id).expect("trust grant");

    let archive = a
        .export_archive(ARCHIVE_PASSPHRASE, Some(&b_id))
        .expect("bootstrap archive");
    b.import_archive(&archive, ARCHIVE_PASSPHRASE)
        .expect("bootstrap import");

    let a_id = a.meta().device_id.clone();
    let a_payload = a
        .generate_pairing_payload()
        .to_json()
        .expect("payload serializes");
    b.process_pairing_payload(&a_payload).expect("pairing");
    b.register_device(&a_id).expect("trust grant");
}

/// Registers a shared in-memory "cloud" blob on both engines.
pub fn attach_shared_blob(a: &mut Worksync, b: &mut Worksync) -> Arc<SharedBlob> {
    let shared = SharedBlob::new();
    a.register_transport(Box::new(MemoryTransport::new(shared.clone())));
    b.register_transport(Box::new(MemoryTransport::new(shared.clone())));
    shared
}
