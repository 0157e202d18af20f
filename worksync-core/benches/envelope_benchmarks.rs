// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Performance Benchmarks for Envelope and Merge Operations
//!
//! Run with: cargo bench -p worksync-core

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use serde_json::json;
use worksync_core::sync::envelope::{EnvelopeHeader, SyncEnvelope};
use worksync_core::{
    ConfigSection, ConfigSnapshot, ConflictDetector, ConflictPolicy, EncryptionAlgorithm,
    EncryptionManager, SymmetricKey, VectorClock, WorkspaceConfig,
};

// =============================================================================
// SYMMETRIC ENCRYPTION BENCHMARKS
// =============================================================================

fn bench_symmetric_encryption(c: &mut Criterion) {
    use worksync_core::crypto::{decrypt, encrypt};

    let key = SymmetricKey::generate();
    let mut group = c.benchmark_group("symmetric_encryption");

    // Typical compressed config snapshot
    let medium_msg = vec![b'x'; 4 * 1024];
    group.throughput(Throughput::Bytes(4 * 1024));
    group.bench_function("encrypt_xchacha20_4KB", |b| {
        b.iter(|| {
            encrypt(
                black_box(&key),
                EncryptionAlgorithm::XChaCha20Poly1305,
                black_box(&medium_msg),
                b"",
            )
        })
    });
    group.bench_function("encrypt_aes_gcm_4KB", |b| {
        b.iter(|| {
            encrypt(
                black_box(&key),
                EncryptionAlgorithm::Aes256Gcm,
                black_box(&medium_msg),
                b"",
            )
        })
    });

    let encrypted = encrypt(
        &key,
        EncryptionAlgorithm::XChaCha20Poly1305,
        &medium_msg,
        b"",
    )
    .unwrap();
    group.bench_function("decrypt_xchacha20_4KB", |b| {
        b.iter(|| decrypt(black_box(&key), black_box(&encrypted), b""))
    });

    group.finish();
}

// =============================================================================
// ENVELOPE BENCHMARKS
// =============================================================================

fn test_snapshot(leaves: usize) -> ConfigSnapshot {
    let mut config = WorkspaceConfig::new();
    for i in 0..leaves {
        config
            .set_value(
                ConfigSection::Settings,
                &format!("option_{}", i),
                json!(format!("value-{}", i)),
                1_700_000_000 + i as u64,
                "device-a",
                "user-1",
            )
            .expect("edit applies");
    }
    let mut clock = VectorClock::new();
    clock.increment("device-a");
    ConfigSnapshot { config, clock }
}

fn bench_envelope_seal_open(c: &mut Criterion) {
    let manager = EncryptionManager::new_workspace("device-a").unwrap();
    let snapshot = test_snapshot(100);
    let payload = snapshot.to_payload().unwrap();

    let header = EnvelopeHeader {
        workspace_id: "ws-bench".to_string(),
        sender_device_id: "device-a".to_string(),
        vector_clock: snapshot.clock.clone(),
        epoch: manager.epoch(),
        key_wraps: Vec::new(),
    };

    let mut group = c.benchmark_group("envelope");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("seal_100_leaves", |b| {
        b.iter(|| {
            SyncEnvelope::seal(
                black_box(&manager),
                black_box(header.clone()),
                black_box(&payload),
            )
        })
    });

    let envelope = SyncEnvelope::seal(&manager, header, &payload).unwrap();
    group.bench_function("encode_decode_100_leaves", |b| {
        b.iter(|| SyncEnvelope::decode(black_box(&envelope.encode().unwrap())))
    });

    group.bench_function("snapshot_payload_roundtrip", |b| {
        b.iter(|| ConfigSnapshot::from_payload(black_box(&payload)))
    });

    group.finish();
}

// =============================================================================
// MERGE BENCHMARKS
// =============================================================================

fn bench_merge(c: &mut Criterion) {
    let local = test_snapshot(100);
    let mut remote = test_snapshot(100);
    remote.clock = {
        let mut clock = VectorClock::new();
        clock.increment("device-b");
        clock
    };

    let mut group = c.benchmark_group("merge");
    for policy in [
        ConflictPolicy::Latest,
        ConflictPolicy::Merge,
        ConflictPolicy::Manual,
    ] {
        let detector = ConflictDetector::new(policy);
        group.bench_function(format!("concurrent_100_leaves_{:?}", policy), |b| {
            b.iter(|| detector.merge(black_box(&local), black_box(&remote)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_symmetric_encryption,
    bench_envelope_seal_open,
    bench_merge
);
criterion_main!(benches);
