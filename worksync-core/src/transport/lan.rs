// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! LAN Transport
//!
//! Direct peer-to-peer sync on the local network: devices announce
//! themselves with signed UDP beacons, and exchange envelopes over a
//! WebSocket data channel. Strictly limited to the workspace's explicit
//! allow-list; preferred opportunistically when peers are reachable but
//! never required for a cycle to succeed.
//!
//! Channel frames: `0x01 || envelope` pushes an envelope, `0x02` requests
//! the peer's current envelope. Payloads are already AEAD-sealed, so the
//! channel itself carries only ciphertext.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{Transport, TransportError, TransportKind, TransportResult};
use crate::crypto::{Signature, SigningKeyPair, VerifyingKey};
use crate::sync::envelope::SyncEnvelope;

/// Default UDP port for discovery beacons.
pub const BEACON_PORT: u16 = 47653;

/// Beacons older than this are ignored.
const BEACON_MAX_AGE_SECONDS: u64 = 60;

/// Frame tag: envelope push.
const FRAME_ENVELOPE: u8 = 0x01;
/// Frame tag: envelope request.
const FRAME_REQUEST: u8 = 0x02;

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

mod signature_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(sig: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(sig))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 64], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid signature length"))
    }
}

/// A signed discovery beacon.
///
/// Announces a device's presence and data-channel address. The signature
/// proves the beacon came from the device holding the paired signing key;
/// receivers drop beacons from unknown or disallowed devices before ever
/// opening a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanBeacon {
    /// Workspace the sender belongs to.
    pub workspace_id: String,
    /// Sender device id.
    pub device_id: String,
    /// Data-channel address, `host:port`.
    pub addr: String,
    /// Unix timestamp; stale beacons are dropped.
    pub timestamp: u64,
    /// Ed25519 signature over the fields above.
    #[serde(with = "signature_serde")]
    signature: [u8; 64],
}

impl LanBeacon {
    /// Creates a signed beacon.
    pub fn new(
        signing_keys: &SigningKeyPair,
        workspace_id: &str,
        device_id: &str,
        addr: &str,
    ) -> Self {
        let mut beacon = LanBeacon {
            workspace_id: workspace_id.to_string(),
            device_id: device_id.to_string(),
            addr: addr.to_string(),
            timestamp: current_timestamp(),
            signature: [0u8; 64],
        };
        beacon.signature = *signing_keys.sign(&beacon.signing_data()).as_bytes();
        beacon
    }

    /// Verifies the signature against the sender's paired signing key.
    pub fn verify(&self, signing_key: &VerifyingKey) -> bool {
        signing_key.verify(&self.signing_data(), &Signature::from_bytes(self.signature))
    }

    /// Returns true when the beacon is too old to act on.
    pub fn is_stale(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > BEACON_MAX_AGE_SECONDS
    }

    /// Encodes for the wire.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("beacon serialization should not fail")
    }

    /// Decodes from wire bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        bincode::deserialize(bytes).ok()
    }

    fn signing_data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"WSLAN:");
        data.extend_from_slice(self.workspace_id.as_bytes());
        data.push(0);
        data.extend_from_slice(self.device_id.as_bytes());
        data.push(0);
        data.extend_from_slice(self.addr.as_bytes());
        data.push(0);
        data.extend_from_slice(&self.timestamp.to_be_bytes());
        data
    }
}

/// A peer currently visible on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    /// Peer device id.
    pub device_id: String,
    /// Data-channel address.
    pub addr: String,
    /// When the peer was last heard.
    pub last_seen: u64,
}

/// Discovery seam: announce ourselves, list visible peers.
pub trait PeerDiscovery: Send {
    /// Broadcasts our beacon.
    fn announce(&mut self) -> TransportResult<()>;

    /// Returns peers heard recently, already signature-checked.
    fn peers(&mut self) -> Vec<DiscoveredPeer>;
}

/// A bidirectional frame channel to one peer.
pub trait PeerChannel: Send {
    /// Sends one frame.
    fn send(&mut self, bytes: &[u8]) -> TransportResult<()>;

    /// Receives one frame, blocking up to the channel's timeout.
    fn receive(&mut self) -> TransportResult<Option<Vec<u8>>>;

    /// Closes the channel.
    fn close(&mut self) -> TransportResult<()>;
}

/// Opens data channels to discovered peers.
pub trait PeerConnector: Send {
    /// Connects to a peer's data channel.
    fn connect(&mut self, peer: &DiscoveredPeer) -> TransportResult<Box<dyn PeerChannel>>;
}

/// The LAN peer transport.
pub struct LanTransport {
    discovery: Mutex<Box<dyn PeerDiscovery>>,
    connector: Box<dyn PeerConnector>,
    /// Device ids admitted to sync with us, from the pairing registry.
    allow_list: BTreeSet<String>,
}

impl LanTransport {
    /// Creates a transport over the given discovery and connector seams.
    pub fn new(discovery: Box<dyn PeerDiscovery>, connector: Box<dyn PeerConnector>) -> Self {
        LanTransport {
            discovery: Mutex::new(discovery),
            connector,
            allow_list: BTreeSet::new(),
        }
    }

    /// Broadcasts our presence.
    pub fn announce(&self) -> TransportResult<()> {
        self.discovery
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .announce()
    }

    fn allowed_peers(&self) -> Vec<DiscoveredPeer> {
        self.discovery
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .peers()
            .into_iter()
            .filter(|p| self.allow_list.contains(&p.device_id))
            .collect()
    }
}

impl Transport for LanTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Lan
    }

    fn is_available(&self) -> bool {
        !self.allowed_peers().is_empty()
    }

    fn supports_real_time_updates(&self) -> bool {
        true
    }

    fn set_allow_list(&mut self, allow_list: &BTreeSet<String>) {
        self.allow_list = allow_list.clone();
    }

    fn upload_configuration(&mut self, envelope: &SyncEnvelope) -> TransportResult<()> {
        let peers = self.allowed_peers();
        if peers.is_empty() {
            return Err(TransportError::Unavailable("no LAN peers".into()));
        }

        let bytes = envelope.encode()?;
        let mut frame = Vec::with_capacity(1 + bytes.len());
        frame.push(FRAME_ENVELOPE);
        frame.extend_from_slice(&bytes);

        let mut delivered = 0;
        let mut last_error = None;
        for peer in &peers {
            match self.connector.connect(peer) {
                Ok(mut channel) => {
                    match channel.send(&frame) {
                        Ok(()) => delivered += 1,
                        Err(e) => last_error = Some(e),
                    }
                    let _ = channel.close();
                }
                Err(e) => last_error = Some(e),
            }
        }

        if delivered > 0 {
            Ok(())
        } else {
            Err(last_error.unwrap_or_else(|| TransportError::Unavailable("no LAN peers".into())))
        }
    }

    fn download_configuration(&mut self) -> TransportResult<Option<SyncEnvelope>> {
        let peers = self.allowed_peers();

        for peer in &peers {
            let mut channel = match self.connector.connect(peer) {
                Ok(c) => c,
                Err(_) => continue,
            };

            let result = (|| -> TransportResult<Option<SyncEnvelope>> {
                channel.send(&[FRAME_REQUEST])?;
                let reply = match channel.receive()? {
                    Some(frame) => frame,
                    None => return Ok(None),
                };
                if reply.first() != Some(&FRAME_ENVELOPE) {
                    return Ok(None);
                }
                let envelope = SyncEnvelope::decode(&reply[1..])?;
                if !self.allow_list.contains(&envelope.header.sender_device_id) {
                    return Err(TransportError::NotAllowed(
                        envelope.header.sender_device_id.clone(),
                    ));
                }
                Ok(Some(envelope))
            })();
            let _ = channel.close();

            match result {
                Ok(Some(envelope)) => return Ok(Some(envelope)),
                Ok(None) => continue,
                Err(TransportError::NotAllowed(id)) => {
                    return Err(TransportError::NotAllowed(id))
                }
                Err(_) => continue,
            }
        }

        Ok(None)
    }
}

/// Serves one inbound peer channel.
///
/// The surrounding application accepts connections (see the `net` module)
/// and hands each channel here with a provider for our current envelope
/// and a sink for envelopes the peer pushes.
pub fn serve_channel<F, G>(
    channel: &mut dyn PeerChannel,
    envelope_provider: F,
    mut on_envelope: G,
) -> TransportResult<()>
where
    F: Fn() -> Option<SyncEnvelope>,
    G: FnMut(SyncEnvelope),
{
    while let Some(frame) = channel.receive()? {
        match frame.first() {
            Some(&FRAME_REQUEST) => {
                if let Some(envelope) = envelope_provider() {
                    let bytes = envelope.encode()?;
                    let mut reply = Vec::with_capacity(1 + bytes.len());
                    reply.push(FRAME_ENVELOPE);
                    reply.extend_from_slice(&bytes);
                    channel.send(&reply)?;
                }
            }
            Some(&FRAME_ENVELOPE) => {
                if let Ok(envelope) = SyncEnvelope::decode(&frame[1..]) {
                    on_envelope(envelope);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// UDP-beacon discovery and WebSocket channels.
#[cfg(feature = "network")]
pub mod net {
    use std::collections::BTreeMap;
    use std::net::{TcpListener, TcpStream, UdpSocket};

    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{Message, WebSocket};

    use super::*;

    /// UDP broadcast discovery on [`BEACON_PORT`].
    ///
    /// Verifies each received beacon against the paired device's signing
    /// key before listing the peer; unknown senders never surface.
    pub struct UdpBeaconDiscovery {
        socket: UdpSocket,
        signing_keys: SigningKeyPair,
        workspace_id: String,
        device_id: String,
        /// Our data-channel address, announced in each beacon.
        channel_addr: String,
        /// device id -> paired signing key, refreshed from the registry.
        known_keys: BTreeMap<String, VerifyingKey>,
        heard: BTreeMap<String, DiscoveredPeer>,
    }

    impl UdpBeaconDiscovery {
        /// Binds the beacon socket.
        pub fn bind(
            signing_keys: SigningKeyPair,
            workspace_id: &str,
            device_id: &str,
            channel_addr: &str,
        ) -> TransportResult<Self> {
            let socket = UdpSocket::bind(("0.0.0.0", BEACON_PORT))?;
            socket.set_broadcast(true)?;
            socket.set_nonblocking(true)?;
            Ok(UdpBeaconDiscovery {
                socket,
                signing_keys,
                workspace_id: workspace_id.to_string(),
                device_id: device_id.to_string(),
                channel_addr: channel_addr.to_string(),
                known_keys: BTreeMap::new(),
                heard: BTreeMap::new(),
            })
        }

        /// Replaces the known signing keys (paired devices).
        pub fn set_known_keys(&mut self, keys: BTreeMap<String, VerifyingKey>) {
            self.known_keys = keys;
        }

        fn drain_socket(&mut self) {
            let mut buf = [0u8; 2048];
            let now = current_timestamp();
            while let Ok((len, _src)) = self.socket.recv_from(&mut buf) {
                let beacon = match LanBeacon::decode(&buf[..len]) {
                    Some(b) => b,
                    None => continue,
                };
                if beacon.workspace_id != self.workspace_id
                    || beacon.device_id == self.device_id
                    || beacon.is_stale(now)
                {
                    continue;
                }
                let key = match self.known_keys.get(&beacon.device_id) {
                    Some(k) => k,
                    None => continue,
                };
                if !beacon.verify(key) {
                    continue;
                }
                self.heard.insert(
                    beacon.device_id.clone(),
                    DiscoveredPeer {
                        device_id: beacon.device_id,
                        addr: beacon.addr,
                        last_seen: now,
                    },
                );
            }
        }
    }

    impl PeerDiscovery for UdpBeaconDiscovery {
        fn announce(&mut self) -> TransportResult<()> {
            // Fresh beacon per announcement so the signed timestamp is live.
            let beacon = LanBeacon::new(
                &self.signing_keys,
                &self.workspace_id,
                &self.device_id,
                &self.channel_addr,
            );
            self.socket
                .send_to(&beacon.encode(), ("255.255.255.255", BEACON_PORT))?;
            Ok(())
        }

        fn peers(&mut self) -> Vec<DiscoveredPeer> {
            self.drain_socket();
            let now = current_timestamp();
            self.heard
                .retain(|_, p| now.saturating_sub(p.last_seen) <= BEACON_MAX_AGE_SECONDS);
            self.heard.values().cloned().collect()
        }
    }

    /// A WebSocket-backed peer channel.
    pub struct WsPeerChannel<S>
    where
        S: std::io::Read + std::io::Write + Send,
    {
        socket: WebSocket<S>,
    }

    impl<S> PeerChannel for WsPeerChannel<S>
    where
        S: std::io::Read + std::io::Write + Send,
    {
        fn send(&mut self, bytes: &[u8]) -> TransportResult<()> {
            self.socket
                .send(Message::Binary(bytes.to_vec()))
                .map_err(|e| TransportError::Unavailable(e.to_string()))
        }

        fn receive(&mut self) -> TransportResult<Option<Vec<u8>>> {
            loop {
                match self.socket.read() {
                    Ok(Message::Binary(bytes)) => return Ok(Some(bytes)),
                    Ok(Message::Close(_)) => return Ok(None),
                    Ok(_) => continue,
                    Err(tungstenite::Error::ConnectionClosed) => return Ok(None),
                    Err(e) => return Err(TransportError::Unavailable(e.to_string())),
                }
            }
        }

        fn close(&mut self) -> TransportResult<()> {
            let _ = self.socket.close(None);
            Ok(())
        }
    }

    /// Connects WebSocket channels to discovered peers.
    pub struct WsConnector;

    impl PeerConnector for WsConnector {
        fn connect(&mut self, peer: &DiscoveredPeer) -> TransportResult<Box<dyn PeerChannel>> {
            let url = format!("ws://{}", peer.addr);
            let (socket, _response) = tungstenite::connect(&url)
                .map_err(|e| TransportError::Unavailable(e.to_string()))?;
            let channel: WsPeerChannel<MaybeTlsStream<TcpStream>> = WsPeerChannel { socket };
            Ok(Box::new(channel))
        }
    }

    /// Accepts inbound peer channels for [`serve_channel`].
    pub struct LanListener {
        listener: TcpListener,
    }

    impl LanListener {
        /// Binds the data-channel listener.
        pub fn bind(addr: &str) -> TransportResult<Self> {
            let listener = TcpListener::bind(addr)?;
            Ok(LanListener { listener })
        }

        /// The bound address, for the discovery beacon.
        pub fn local_addr(&self) -> TransportResult<String> {
            Ok(self.listener.local_addr()?.to_string())
        }

        /// Accepts one inbound channel, blocking.
        pub fn accept(&self) -> TransportResult<Box<dyn PeerChannel>> {
            let (stream, _addr) = self.listener.accept()?;
            let socket = tungstenite::accept(stream)
                .map_err(|e| TransportError::Unavailable(e.to_string()))?;
            let channel: WsPeerChannel<TcpStream> = WsPeerChannel { socket };
            Ok(Box::new(channel))
        }
    }
}
