// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Engine
//!
//! Causality tracking, conflict resolution, the envelope wire format and
//! the coordinator that runs cycles end-to-end.

pub mod clock;
pub mod conflict;
pub mod coordinator;
pub mod envelope;
pub mod state;

pub use clock::{ClockOrdering, VectorClock};
pub use conflict::{
    ConflictDetector, ConflictPolicy, ConflictResolution, ConflictSide, MergeOutcome, SyncConflict,
};
pub use coordinator::{CycleContext, SyncCoordinator, SyncError, SyncReport};
pub use envelope::{EnvelopeError, EnvelopeHeader, SyncEnvelope};
pub use state::{SyncState, SyncStats, SyncStatus};
