// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device Pairing
//!
//! Pairing handshake payloads, the per-workspace trust store and trust
//! grants (wrapped sync key delivery).

pub mod payload;
pub mod registry;

pub use payload::PairingPayload;
pub use registry::{DevicePairingRegistry, DeviceType, PairingError, SyncDevice, TrustGrant};
