// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for sync::state

use worksync_core::{SyncState, SyncStatus};

#[test]
fn default_state_is_idle_and_empty() {
    let state = SyncState::default();
    assert_eq!(state.status, SyncStatus::Idle);
    assert!(state.last_sync.is_none());
    assert!(state.last_error.is_none());
    assert_eq!(state.pending_changes, 0);
    assert_eq!(state.conflicts, 0);
    assert!(!state.needs_repair);
    assert!(state.vector_clock.is_empty());
}

#[test]
fn stats_track_counts_and_average() {
    let mut state = SyncState::default();
    assert!(state.stats.average_duration_ms().is_none());

    state.stats.record_success(100);
    state.stats.record_success(300);
    state.stats.record_failure(200);

    assert_eq!(state.stats.total, 3);
    assert_eq!(state.stats.success, 2);
    assert_eq!(state.stats.failed, 1);
    assert_eq!(state.stats.average_duration_ms(), Some(200));
}

#[test]
fn stats_duration_window_is_bounded() {
    let mut state = SyncState::default();
    for i in 0..100 {
        state.stats.record_success(i);
    }
    assert_eq!(state.stats.total, 100);
    assert!(state.stats.durations_ms.len() <= 32);
    // Only recent cycles remain in the window.
    assert_eq!(*state.stats.durations_ms.last().unwrap(), 99);
}

#[test]
fn state_serializes_for_ui_consumption() {
    let mut state = SyncState::default();
    state.status = SyncStatus::Error;
    state.last_error = Some("transport unavailable".to_string());

    let json = serde_json::to_string(&state).unwrap();
    assert!(json.contains("\"error\""));

    let parsed: SyncState = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, state);
}
