// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the pairing module
//!
//! Payload signing and expiry, the paired-vs-trusted distinction and
//! allow-list maintenance.

use chrono::{Duration, Utc};
use worksync_core::crypto::SigningKeyPair;
use worksync_core::pairing::{
    DevicePairingRegistry, DeviceType, PairingError, PairingPayload,
};

fn payload_for(keys: &SigningKeyPair, device_id: &str) -> PairingPayload {
    PairingPayload::generate(
        keys,
        device_id,
        "Test Laptop",
        DeviceType::Laptop,
        "linux",
        [9u8; 32],
        vec!["cloud".to_string(), "lan".to_string()],
    )
}

#[test]
fn payload_json_roundtrip_preserves_fields() {
    let keys = SigningKeyPair::generate().unwrap();
    let payload = payload_for(&keys, "device-b");

    let json = payload.to_json().unwrap();
    // Wire field names are part of the pairing contract.
    assert!(json.contains("\"deviceId\""));
    assert!(json.contains("\"publicKey\""));
    assert!(json.contains("\"pairingToken\""));
    assert!(json.contains("\"expiresAt\""));

    let parsed = PairingPayload::from_json(&json).unwrap();
    assert_eq!(parsed, payload);
    assert!(parsed.verify_signature());
    assert!(!parsed.is_expired());
}

#[test]
fn tampered_payload_is_rejected() {
    let keys = SigningKeyPair::generate().unwrap();
    let payload = payload_for(&keys, "device-b");
    let json = payload.to_json().unwrap();

    let tampered = json.replace("device-b", "device-x");
    assert!(matches!(
        PairingPayload::from_json(&tampered),
        Err(PairingError::InvalidSignature)
    ));
}

#[test]
fn expired_payload_is_rejected_at_processing() {
    let keys = SigningKeyPair::generate().unwrap();
    let payload = PairingPayload::generate_with_expiry(
        &keys,
        "device-b",
        "Old Phone",
        DeviceType::Mobile,
        "android",
        [9u8; 32],
        Vec::new(),
        Utc::now() - Duration::seconds(1),
    );

    let mut registry = DevicePairingRegistry::new();
    assert!(matches!(
        registry.process_payload(&payload, "device-a"),
        Err(PairingError::Expired)
    ));
}

#[test]
fn pairing_records_device_as_untrusted() {
    let keys = SigningKeyPair::generate().unwrap();
    let payload = payload_for(&keys, "device-b");

    let mut registry = DevicePairingRegistry::new();
    let device = registry.process_payload(&payload, "device-a").unwrap();

    assert_eq!(device.id, "device-b");
    assert_eq!(device.name, "Test Laptop");
    assert!(!device.trusted, "pairing alone must never grant trust");
    assert!(!registry.is_allowed_on_lan("device-b"));
    assert_eq!(registry.trusted_count(), 0);
}

#[test]
fn duplicate_and_self_pairing_are_rejected() {
    let keys = SigningKeyPair::generate().unwrap();
    let payload = payload_for(&keys, "device-b");

    let mut registry = DevicePairingRegistry::new();
    registry.process_payload(&payload, "device-a").unwrap();

    assert!(matches!(
        registry.process_payload(&payload, "device-a"),
        Err(PairingError::AlreadyPaired(_))
    ));
    assert!(matches!(
        registry.process_payload(&payload, "device-b"),
        Err(PairingError::SelfPairing)
    ));
}

#[test]
fn trust_is_an_explicit_transition() {
    let keys = SigningKeyPair::generate().unwrap();
    let payload = payload_for(&keys, "device-b");

    let mut registry = DevicePairingRegistry::new();
    registry.process_payload(&payload, "device-a").unwrap();
    let device = registry.trust_device("device-b").unwrap();

    assert!(device.trusted);
    assert!(registry.is_allowed_on_lan("device-b"));
    assert_eq!(registry.trusted_keys(), vec![("device-b".to_string(), [9u8; 32])]);
}

#[test]
fn removal_clears_record_and_allow_list() {
    let keys = SigningKeyPair::generate().unwrap();
    let payload = payload_for(&keys, "device-b");

    let mut registry = DevicePairingRegistry::new();
    registry.process_payload(&payload, "device-a").unwrap();
    registry.trust_device("device-b").unwrap();

    let removed = registry.remove_device("device-b").unwrap();
    assert_eq!(removed.id, "device-b");
    assert!(registry.find("device-b").is_none());
    assert!(!registry.is_allowed_on_lan("device-b"));

    assert!(matches!(
        registry.remove_device("device-b"),
        Err(PairingError::DeviceNotFound(_))
    ));
}

#[test]
fn registry_json_roundtrip() {
    let keys = SigningKeyPair::generate().unwrap();
    let payload = payload_for(&keys, "device-b");

    let mut registry = DevicePairingRegistry::new();
    registry.process_payload(&payload, "device-a").unwrap();
    registry.trust_device("device-b").unwrap();
    // last_seen only moves forward.
    registry.touch("device-b", 4_000_000_000);

    let restored = DevicePairingRegistry::from_json(&registry.to_json()).unwrap();
    assert_eq!(restored.devices().len(), 1);
    assert!(restored.is_allowed_on_lan("device-b"));
    assert_eq!(restored.find("device-b").unwrap().last_seen, 4_000_000_000);
}

#[test]
fn qr_rendering_produces_output() {
    let keys = SigningKeyPair::generate().unwrap();
    let payload = payload_for(&keys, "device-b");
    let qr = payload.to_qr_string().unwrap();
    assert!(!qr.is_empty());
}
