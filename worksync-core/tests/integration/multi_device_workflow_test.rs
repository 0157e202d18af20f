// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Multi-Device Workflow Integration Tests
//!
//! Three devices, one workspace: pairing fan-out, convergence across a
//! shared cloud blob, policy switching and offline archive bridging.

use serde_json::json;
use worksync_core::storage::MemoryKeyStorage;
use worksync_core::transport::SharedBlob;
use worksync_core::{
    ConfigSection, ConflictPolicy, ConflictResolution, MemoryTransport, SyncSettings,
    SyncSettingsUpdate, Worksync, WorksyncConfig,
};

const PASSPHRASE: &str = "correct-horse-battery-staple";

fn engine(device_name: &str) -> Worksync {
    let config = WorksyncConfig {
        user_id: "user-1".to_string(),
        device_name: device_name.to_string(),
        sync: SyncSettings {
            retry_base_delay_ms: 1,
            ..SyncSettings::default()
        },
        ..WorksyncConfig::default()
    };
    Worksync::initialize(config, Box::new(MemoryKeyStorage::new())).unwrap()
}

fn link(hub: &mut Worksync, joiner: &mut Worksync) {
    let joiner_id = joiner.meta().device_id.clone();
    let payload = joiner.generate_pairing_payload().to_json().unwrap();
    hub.process_pairing_payload(&payload).unwrap();
    hub.register_device(&joiner_id).unwrap();
    let archive = hub.export_archive(PASSPHRASE, Some(&joiner_id)).unwrap();
    joiner.import_archive(&archive, PASSPHRASE).unwrap();

    let hub_id = hub.meta().device_id.clone();
    let payload = hub.generate_pairing_payload().to_json().unwrap();
    joiner.process_pairing_payload(&payload).unwrap();
    joiner.register_device(&hub_id).unwrap();
}

#[test]
fn three_devices_converge_over_shared_blob() {
    let mut desk = engine("desk");
    let mut laptop = engine("laptop");
    let mut phone = engine("phone");
    link(&mut desk, &mut laptop);
    link(&mut desk, &mut phone);

    // Everyone shares the same workspace identity after bootstrap.
    assert_eq!(desk.meta().workspace_id, laptop.meta().workspace_id);
    assert_eq!(desk.meta().workspace_id, phone.meta().workspace_id);
    assert_eq!(desk.devices().len(), 2);

    let shared = SharedBlob::new();
    for ws in [&mut desk, &mut laptop, &mut phone] {
        ws.register_transport(Box::new(MemoryTransport::new(shared.clone())));
    }

    // Sequential edits on different devices to different sections.
    desk.set_config_value(ConfigSection::Settings, "theme", json!("dark"))
        .unwrap();
    desk.sync_now().unwrap();

    laptop.sync_now().unwrap();
    laptop
        .set_config_value(ConfigSection::Keybindings, "save", json!("ctrl+s"))
        .unwrap();
    laptop.sync_now().unwrap();

    phone.sync_now().unwrap();
    assert_eq!(
        phone.get_config_value(ConfigSection::Settings, "theme"),
        Some(json!("dark"))
    );
    assert_eq!(
        phone.get_config_value(ConfigSection::Keybindings, "save"),
        Some(json!("ctrl+s"))
    );

    // Clock knows all three writers' history after convergence.
    let state = phone.sync_state();
    assert_eq!(state.conflicts, 0);
    assert_eq!(state.vector_clock.get(&desk.meta().device_id), 1);
    assert_eq!(state.vector_clock.get(&laptop.meta().device_id), 1);
}

#[test]
fn merge_policy_workspace_auto_resolves_concurrent_edits() {
    let mut desk = engine("desk");
    let mut laptop = engine("laptop");
    link(&mut desk, &mut laptop);

    for ws in [&mut desk, &mut laptop] {
        ws.update_sync_config(SyncSettingsUpdate {
            conflict_resolution: Some(ConflictPolicy::Merge),
            ..Default::default()
        })
        .unwrap();
    }

    let shared = SharedBlob::new();
    desk.register_transport(Box::new(MemoryTransport::new(shared.clone())));
    laptop.register_transport(Box::new(MemoryTransport::new(shared.clone())));

    // Concurrent edits to different leaves of the same section.
    desk.set_config_value(ConfigSection::Settings, "theme", json!("dark"))
        .unwrap();
    laptop
        .set_config_value(ConfigSection::Settings, "font_size", json!(14))
        .unwrap();

    desk.sync_now().unwrap();
    laptop.sync_now().unwrap();
    desk.sync_now().unwrap();

    // Both leaves survive on both devices, no conflicts recorded.
    for ws in [&desk, &laptop] {
        assert_eq!(
            ws.get_config_value(ConfigSection::Settings, "theme"),
            Some(json!("dark"))
        );
        assert_eq!(
            ws.get_config_value(ConfigSection::Settings, "font_size"),
            Some(json!(14))
        );
        assert_eq!(ws.sync_state().conflicts, 0);
    }
}

#[test]
fn manual_conflict_full_lifecycle() {
    let mut desk = engine("desk");
    let mut laptop = engine("laptop");
    link(&mut desk, &mut laptop);

    let shared = SharedBlob::new();
    desk.register_transport(Box::new(MemoryTransport::new(shared.clone())));
    laptop.register_transport(Box::new(MemoryTransport::new(shared.clone())));

    desk.set_config_value(ConfigSection::Settings, "theme", json!("dark"))
        .unwrap();
    laptop
        .set_config_value(ConfigSection::Settings, "theme", json!("light"))
        .unwrap();

    desk.sync_now().unwrap();
    laptop.sync_now().unwrap();
    desk.sync_now().unwrap();

    // Resolve on desk by taking the remote side.
    let conflict = desk.conflicts().unwrap().remove(0);
    desk.resolve_conflict(&conflict.id, ConflictResolution::Remote)
        .unwrap();
    assert_eq!(
        desk.get_config_value(ConfigSection::Settings, "theme"),
        Some(json!("light"))
    );

    // The resolution is an ordinary local edit: it dominates and spreads.
    desk.sync_now().unwrap();
    laptop.sync_now().unwrap();
    assert_eq!(
        laptop.get_config_value(ConfigSection::Settings, "theme"),
        Some(json!("light"))
    );
}

#[test]
fn archive_bridges_fully_offline_device() {
    let mut desk = engine("desk");
    let mut laptop = engine("laptop");
    link(&mut desk, &mut laptop);

    // No transports anywhere: the archive is the only bridge.
    desk.set_config_value(ConfigSection::NotificationRules, "mail.muted", json!(true))
        .unwrap();
    let archive = desk.export_archive(PASSPHRASE, None).unwrap();

    let report = laptop.import_archive(&archive, PASSPHRASE).unwrap();
    assert!(matches!(
        report,
        worksync_core::SyncReport::Completed { took_remote: true, .. }
    ));
    assert_eq!(
        laptop.get_config_value(ConfigSection::NotificationRules, "mail.muted"),
        Some(json!(true))
    );
}
