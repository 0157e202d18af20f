// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync State
//!
//! The per-workspace state record exposed to the UI layer. One instance
//! per workspace, mutated only by the coordinator.

use serde::{Deserialize, Serialize};

use super::clock::VectorClock;

/// How many recent cycle durations to keep for stats.
const DURATION_WINDOW: usize = 32;

/// Coordinator state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    /// No cycle running.
    #[default]
    Idle,
    /// A cycle is in flight.
    Syncing,
    /// The last cycle failed.
    Error,
    /// Sync is paused by the user.
    Paused,
}

/// Cycle counters and a window of recent durations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Cycles attempted.
    pub total: u64,
    /// Cycles that completed.
    pub success: u64,
    /// Cycles that failed.
    pub failed: u64,
    /// Durations of recent cycles, milliseconds.
    pub durations_ms: Vec<u64>,
}

impl SyncStats {
    /// Records a completed cycle.
    pub fn record_success(&mut self, duration_ms: u64) {
        self.total += 1;
        self.success += 1;
        self.push_duration(duration_ms);
    }

    /// Records a failed cycle.
    pub fn record_failure(&mut self, duration_ms: u64) {
        self.total += 1;
        self.failed += 1;
        self.push_duration(duration_ms);
    }

    /// Mean duration over the window, if any cycles ran.
    pub fn average_duration_ms(&self) -> Option<u64> {
        if self.durations_ms.is_empty() {
            return None;
        }
        Some(self.durations_ms.iter().sum::<u64>() / self.durations_ms.len() as u64)
    }

    fn push_duration(&mut self, duration_ms: u64) {
        self.durations_ms.push(duration_ms);
        if self.durations_ms.len() > DURATION_WINDOW {
            self.durations_ms.remove(0);
        }
    }
}

/// Snapshot of a workspace's sync position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// State machine position.
    pub status: SyncStatus,
    /// Unix timestamp of the last successful cycle.
    pub last_sync: Option<u64>,
    /// Description of the last failure, if any.
    pub last_error: Option<String>,
    /// Cycle counters.
    pub stats: SyncStats,
    /// Local mutations not yet synced.
    pub pending_changes: u64,
    /// Unresolved conflict count.
    pub conflicts: usize,
    /// Current local vector clock.
    pub vector_clock: VectorClock,
    /// True when a key/epoch mismatch requires re-pairing this device.
    pub needs_repair: bool,
}
