// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Workspace Configuration
//!
//! The config tree model, snapshot serialization and the single-writer
//! store. The tree itself is owned by the surrounding application; this
//! module tracks causality and packages snapshots for encryption.

pub mod model;
pub mod store;

pub use model::{
    ConfigSection, ConfigSnapshot, LastModified, ValidationError, WorkspaceConfig, FORMAT_VERSION,
};
pub use store::ConfigStore;
