// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Worksync API Layer
//!
//! High-level API for the Worksync configuration-sync engine.
//!
//! # Overview
//!
//! The API layer provides the surface the surrounding application
//! (settings screens, device-management UI, notification glue) consumes:
//! - Workspace initialization and restore
//! - Sync cycles and scheduling
//! - Pairing, trust and device removal
//! - Conflict resolution
//! - Event subscriptions
//!
//! # Example
//!
//! ```ignore
//! use worksync_core::api::{Worksync, WorksyncConfig};
//! use worksync_core::config::ConfigSection;
//! use worksync_core::storage::MemoryKeyStorage;
//!
//! let mut ws = Worksync::initialize(
//!     WorksyncConfig::default(),
//!     Box::new(MemoryKeyStorage::new()),
//! )?;
//!
//! ws.set_config_value(ConfigSection::Settings, "theme", "dark".into())?;
//! ws.sync_now()?;
//! ```

#[cfg(feature = "testing")]
pub mod config;
#[cfg(not(feature = "testing"))]
pub(crate) mod config;

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
pub(crate) mod error;

#[cfg(feature = "testing")]
pub mod events;
#[cfg(not(feature = "testing"))]
pub(crate) mod events;

#[cfg(feature = "testing")]
pub mod worksync;
#[cfg(not(feature = "testing"))]
mod worksync;

// Error types
pub use error::{WorksyncError, WorksyncResult};

// Configuration
pub use config::{SyncSettings, SyncSettingsUpdate, WorksyncConfig};

// Events
pub use events::{CallbackHandler, EventBus, EventHandler, SubscriberHandle, SyncEvent};

// Worksync
pub use worksync::Worksync;
