// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the transport module
//!
//! Blob stores, archives, the manager's fan-out and LAN allow-listing.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use worksync_core::crypto::SigningKeyPair;
use worksync_core::pairing::TrustGrant;
use worksync_core::sync::envelope::{EnvelopeHeader, SyncEnvelope};
use worksync_core::transport::{
    lan::{DiscoveredPeer, PeerChannel, PeerConnector, PeerDiscovery},
    BlobStore, CloudTransport, DirBlobStore, SharedBlob, SyncArchive,
};
use worksync_core::{
    EncryptionManager, KdfAlgorithm, LanTransport, MemoryTransport, Transport, TransportError,
    TransportManager, VectorClock,
};

fn test_envelope(manager: &EncryptionManager, sender: &str) -> SyncEnvelope {
    let mut clock = VectorClock::new();
    clock.increment(sender);
    SyncEnvelope::seal(
        manager,
        EnvelopeHeader {
            workspace_id: "ws-1".to_string(),
            sender_device_id: sender.to_string(),
            vector_clock: clock,
            epoch: manager.epoch(),
            key_wraps: manager.wraps(),
        },
        b"snapshot-bytes",
    )
    .unwrap()
}

#[test]
fn dir_blob_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DirBlobStore::new(dir.path());
    assert!(store.is_available());

    assert!(store.get("ws-1").unwrap().is_none());
    store.put("ws-1", b"blob").unwrap();
    assert_eq!(store.get("ws-1").unwrap().unwrap(), b"blob");
    assert!(store.last_modified("ws-1").unwrap().is_some());

    // Unavailable when the folder (e.g. a provider mount) is gone.
    let missing = DirBlobStore::new(dir.path().join("nope"));
    assert!(!missing.is_available());
}

#[test]
fn cloud_transport_stashes_peer_blob_on_upload() {
    let dir = tempfile::tempdir().unwrap();
    let manager = EncryptionManager::new_workspace("device-a").unwrap();

    let peer_envelope = test_envelope(&manager, "device-b");
    let mut store = DirBlobStore::new(dir.path());
    store.put("ws-1", &peer_envelope.encode().unwrap()).unwrap();

    let mut transport = CloudTransport::new("ws-1", Box::new(DirBlobStore::new(dir.path())));
    let ours = test_envelope(&manager, "device-a");
    transport.upload_configuration(&ours).unwrap();

    // The peer's envelope was not lost to the overwrite.
    let downloaded = transport.download_configuration().unwrap().unwrap();
    assert_eq!(downloaded.header.sender_device_id, "device-b");

    // Next download sees the current blob (ours).
    let downloaded = transport.download_configuration().unwrap().unwrap();
    assert_eq!(downloaded.header.sender_device_id, "device-a");
}

#[test]
fn archive_roundtrip_with_trust_grant() {
    let mut alice = EncryptionManager::new_workspace("device-a").unwrap();
    let bob = EncryptionManager::new_joining("device-b").unwrap();
    let wrapped = alice
        .wrap_key_for("device-b", &bob.device_public_key())
        .unwrap();
    let grant = TrustGrant {
        device_id: "device-b".to_string(),
        wrapped_key: wrapped,
        granted_at: 1,
    };

    let envelope = test_envelope(&alice, "device-a");
    let archive = SyncArchive::seal(
        &envelope,
        Some(grant.clone()),
        "correct-horse-battery-staple",
        KdfAlgorithm::Argon2id,
    )
    .unwrap();

    let (opened, opened_grant) =
        SyncArchive::open(archive.as_bytes(), "correct-horse-battery-staple").unwrap();
    assert_eq!(opened.header, envelope.header);
    assert_eq!(opened_grant.unwrap(), grant);
}

#[test]
fn archive_rejects_weak_passphrase_and_wrong_passphrase() {
    let alice = EncryptionManager::new_workspace("device-a").unwrap();
    let envelope = test_envelope(&alice, "device-a");

    assert!(matches!(
        SyncArchive::seal(&envelope, None, "password", KdfAlgorithm::Argon2id),
        Err(TransportError::WeakPassphrase(_))
    ));

    let archive = SyncArchive::seal(
        &envelope,
        None,
        "correct-horse-battery-staple",
        KdfAlgorithm::Argon2id,
    )
    .unwrap();
    assert!(SyncArchive::open(archive.as_bytes(), "wrong-guess-entirely-off").is_err());
}

#[test]
fn manager_uploads_to_all_available_transports() {
    let alice = EncryptionManager::new_workspace("device-a").unwrap();
    let envelope = test_envelope(&alice, "device-a");

    let blob_one = SharedBlob::new();
    let blob_two = SharedBlob::new();
    let mut offline = MemoryTransport::new(blob_two.clone());
    offline.set_available(false);

    let mut manager = TransportManager::new();
    manager.register(Box::new(MemoryTransport::new(blob_one.clone())));
    manager.register(Box::new(offline));

    let delivered = manager.upload(&envelope).unwrap();
    assert_eq!(delivered, 1, "only the reachable transport is used");

    let (envelopes, errors) = manager.download();
    assert_eq!(envelopes.len(), 1);
    assert!(errors.is_empty());
}

#[test]
fn manager_fails_when_no_transport_delivers() {
    let alice = EncryptionManager::new_workspace("device-a").unwrap();
    let envelope = test_envelope(&alice, "device-a");

    let mut failing = MemoryTransport::isolated();
    failing.fail_next(1);

    let mut manager = TransportManager::new();
    manager.register(Box::new(failing));

    let error = manager.upload(&envelope).unwrap_err();
    assert!(error.is_retryable());
}

// === LAN mocks ===

#[derive(Default)]
struct StaticDiscovery {
    peers: Vec<DiscoveredPeer>,
}

impl PeerDiscovery for StaticDiscovery {
    fn announce(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn peers(&mut self) -> Vec<DiscoveredPeer> {
        self.peers.clone()
    }
}

/// A loopback channel backed by shared frame queues.
struct QueueChannel {
    inbox: Arc<Mutex<Vec<Vec<u8>>>>,
    outbox: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl PeerChannel for QueueChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.outbox
            .lock()
            .unwrap()
            .push(bytes.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut inbox = self.inbox.lock().unwrap();
        if inbox.is_empty() {
            Ok(None)
        } else {
            Ok(Some(inbox.remove(0)))
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Connector whose channels answer every request with a fixed envelope.
struct ReplayConnector {
    reply: Vec<u8>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl PeerConnector for ReplayConnector {
    fn connect(
        &mut self,
        _peer: &DiscoveredPeer,
    ) -> Result<Box<dyn PeerChannel>, TransportError> {
        let mut frame = vec![0x01];
        frame.extend_from_slice(&self.reply);
        Ok(Box::new(QueueChannel {
            inbox: Arc::new(Mutex::new(vec![frame])),
            outbox: self.sent.clone(),
        }))
    }
}

#[test]
fn lan_transport_enforces_allow_list() {
    let alice = EncryptionManager::new_workspace("device-a").unwrap();
    let peer_envelope = test_envelope(&alice, "device-b");

    let discovery = StaticDiscovery {
        peers: vec![DiscoveredPeer {
            device_id: "device-b".to_string(),
            addr: "127.0.0.1:9".to_string(),
            last_seen: 0,
        }],
    };
    let sent = Arc::new(Mutex::new(Vec::new()));
    let connector = ReplayConnector {
        reply: peer_envelope.encode().unwrap(),
        sent: sent.clone(),
    };

    let mut lan = LanTransport::new(Box::new(discovery), Box::new(connector));

    // Peer visible but not allowed: the transport is unavailable.
    assert!(!lan.is_available());
    assert!(lan.download_configuration().unwrap().is_none());

    let mut allowed = BTreeSet::new();
    allowed.insert("device-b".to_string());
    lan.set_allow_list(&allowed);

    assert!(lan.is_available());
    let downloaded = lan.download_configuration().unwrap().unwrap();
    assert_eq!(downloaded.header.sender_device_id, "device-b");

    // Upload pushes an envelope frame to the allowed peer.
    let ours = test_envelope(&alice, "device-a");
    lan.upload_configuration(&ours).unwrap();
    let frames = sent.lock().unwrap();
    assert!(frames.iter().any(|f| f.first() == Some(&0x01)));
}

#[test]
fn lan_beacon_verification() {
    use worksync_core::transport::LanBeacon;

    let keys = SigningKeyPair::generate().unwrap();
    let beacon = LanBeacon::new(&keys, "ws-1", "device-a", "192.168.1.20:47654");

    assert!(beacon.verify(&keys.public_key()));
    assert!(!beacon.is_stale(beacon.timestamp + 30));
    assert!(beacon.is_stale(beacon.timestamp + 120));

    let other = SigningKeyPair::generate().unwrap();
    assert!(!beacon.verify(&other.public_key()));

    let decoded = LanBeacon::decode(&beacon.encode()).unwrap();
    assert_eq!(decoded, beacon);
}
