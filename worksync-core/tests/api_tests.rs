// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the API layer
//!
//! Engine lifecycle, settings updates, events and credentials.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use worksync_core::api::{CallbackHandler, SyncEvent};
use worksync_core::storage::MemoryKeyStorage;
use worksync_core::transport::CloudCredentials;
use worksync_core::{
    ConfigSection, ConflictPolicy, SyncSettingsUpdate, Worksync, WorksyncConfig,
};

use common::build_engine;

#[test]
fn local_edits_bump_only_own_clock_entry() {
    let mut ws = build_engine("user-1", "desk");
    let device_id = ws.meta().device_id.clone();

    for expected in 1..=3 {
        ws.set_config_value(ConfigSection::Settings, "theme", json!("dark"))
            .unwrap();
        let clock = ws.sync_state().vector_clock;
        assert_eq!(clock.get(&device_id), expected);
        assert_eq!(clock.devices().count(), 1, "no other entry appears");
    }
    assert_eq!(ws.sync_state().pending_changes, 3);
}

#[test]
fn update_sync_config_applies_partial_fields() {
    let mut ws = build_engine("user-1", "desk");
    ws.update_sync_config(SyncSettingsUpdate {
        conflict_resolution: Some(ConflictPolicy::Merge),
        max_retries: Some(7),
        ..Default::default()
    })
    .unwrap();

    // Untouched fields keep their values; changed ones stick. Observable
    // through behavior: a merge-policy engine resolves concurrent edits
    // without conflicts (covered in engine tests); here we at least ensure
    // the call round-trips without invalidating state.
    assert_eq!(ws.sync_state().conflicts, 0);
}

#[test]
fn events_are_ordered_and_unsubscribable() {
    let mut ws = build_engine("user-1", "desk");
    ws.register_transport(Box::new(worksync_core::MemoryTransport::isolated()));

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let handle = ws.subscribe(Arc::new(CallbackHandler::new(move |event: SyncEvent| {
        let label = match event {
            SyncEvent::SyncStarted => "started",
            SyncEvent::SyncCompleted { .. } => "completed",
            _ => return,
        };
        seen_clone.lock().unwrap().push(label.to_string());
    })));

    ws.sync_now().unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["started".to_string(), "completed".to_string()]
    );

    assert!(ws.unsubscribe(handle));
    assert!(!ws.unsubscribe(handle), "second unsubscribe is a no-op");

    ws.sync_now().unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2, "no events after unsubscribe");
}

#[test]
fn pairing_events_fire() {
    let mut a = build_engine("user-1", "desk");
    let mut b = build_engine("user-1", "laptop");

    let paired = Arc::new(AtomicUsize::new(0));
    let trusted = Arc::new(AtomicUsize::new(0));
    let paired_clone = paired.clone();
    let trusted_clone = trusted.clone();
    a.subscribe(Arc::new(CallbackHandler::new(move |event: SyncEvent| {
        match event {
            SyncEvent::DevicePaired { .. } => {
                paired_clone.fetch_add(1, Ordering::SeqCst);
            }
            SyncEvent::DeviceTrusted { .. } => {
                trusted_clone.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    })));

    let payload = b.generate_pairing_payload().to_json().unwrap();
    a.process_pairing_payload(&payload).unwrap();
    assert_eq!(paired.load(Ordering::SeqCst), 1);
    assert_eq!(trusted.load(Ordering::SeqCst), 0);

    a.register_device(&b.meta().device_id).unwrap();
    assert_eq!(trusted.load(Ordering::SeqCst), 1);
}

#[test]
fn cloud_credentials_are_sealed_at_rest() {
    let mut ws = build_engine("user-1", "desk");
    let credentials = CloudCredentials {
        provider: "dropbox".to_string(),
        account: "user@example.com".to_string(),
        secret: "oauth-refresh-token".to_string(),
    };

    ws.set_cloud_credentials(&credentials).unwrap();
    let loaded = ws.cloud_credentials("dropbox").unwrap().unwrap();
    assert_eq!(loaded, credentials);
    assert!(ws.cloud_credentials("gdrive").unwrap().is_none());
}

#[test]
fn engine_restores_from_persistent_storage() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("worksync.db");
    let secure = Arc::new(MemoryKeyStorage::new());

    // A Box wrapper so both engine instances share the same key store,
    // the way a platform keychain would persist across launches.
    struct SharedSecure(Arc<MemoryKeyStorage>);
    impl worksync_core::SecureStorage for SharedSecure {
        fn save_key(&self, name: &str, key: &[u8]) -> Result<(), worksync_core::StorageError> {
            self.0.save_key(name, key)
        }
        fn load_key(&self, name: &str) -> Result<Option<Vec<u8>>, worksync_core::StorageError> {
            self.0.load_key(name)
        }
        fn delete_key(&self, name: &str) -> Result<(), worksync_core::StorageError> {
            self.0.delete_key(name)
        }
    }

    let config = WorksyncConfig {
        storage_path: Some(db_path.clone()),
        user_id: "user-1".to_string(),
        device_name: "desk".to_string(),
        ..WorksyncConfig::default()
    };

    let workspace_id;
    let device_id;
    {
        let mut ws =
            Worksync::initialize(config.clone(), Box::new(SharedSecure(secure.clone()))).unwrap();
        workspace_id = ws.meta().workspace_id.clone();
        device_id = ws.meta().device_id.clone();
        ws.set_config_value(ConfigSection::Settings, "theme", json!("dark"))
            .unwrap();
    }

    let restored = Worksync::initialize(config, Box::new(SharedSecure(secure))).unwrap();
    assert_eq!(restored.meta().workspace_id, workspace_id);
    assert_eq!(restored.meta().device_id, device_id);
    assert_eq!(
        restored.sync_state().vector_clock.get(&device_id),
        1,
        "clock survives restart"
    );
}
