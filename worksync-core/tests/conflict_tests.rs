// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for sync::conflict
//!
//! Dominance fast paths, the three concurrent-merge policies and their
//! determinism guarantees.

use serde_json::{json, Value};
use worksync_core::{
    ConfigSection, ConfigSnapshot, ConflictDetector, ConflictPolicy, ConflictResolution,
    VectorClock, WorkspaceConfig,
};

fn clock(entries: &[(&str, u64)]) -> VectorClock {
    let mut clock = VectorClock::new();
    for (device, count) in entries {
        for _ in 0..*count {
            clock.increment(device);
        }
    }
    clock
}

fn snapshot(
    device: &str,
    clock: VectorClock,
    edits: &[(ConfigSection, &str, Value, u64)],
) -> ConfigSnapshot {
    let mut config = WorkspaceConfig::new();
    for (section, path, value, timestamp) in edits {
        config
            .set_value(*section, path, value.clone(), *timestamp, device, "user-1")
            .expect("edit applies");
    }
    ConfigSnapshot { config, clock }
}

#[test]
fn dominant_remote_replaces_wholesale() {
    let local = snapshot(
        "A",
        clock(&[("A", 1)]),
        &[(ConfigSection::Settings, "theme", json!("dark"), 100)],
    );
    let remote = snapshot(
        "B",
        clock(&[("A", 1), ("B", 2)]),
        &[(ConfigSection::Settings, "theme", json!("light"), 200)],
    );

    let detector = ConflictDetector::new(ConflictPolicy::Manual);
    let outcome = detector.merge(&local, &remote);

    assert!(outcome.took_remote);
    assert!(outcome.conflicts.is_empty());
    assert_eq!(
        outcome.snapshot.config.get_value(ConfigSection::Settings, "theme"),
        Some(&json!("light"))
    );
    assert_eq!(outcome.snapshot.clock.get("A"), 1);
    assert_eq!(outcome.snapshot.clock.get("B"), 2);
}

#[test]
fn dominant_local_keeps_everything() {
    let local = snapshot(
        "A",
        clock(&[("A", 3), ("B", 1)]),
        &[(ConfigSection::Settings, "theme", json!("dark"), 100)],
    );
    let remote = snapshot(
        "B",
        clock(&[("A", 2), ("B", 1)]),
        &[(ConfigSection::Settings, "theme", json!("light"), 200)],
    );

    let detector = ConflictDetector::new(ConflictPolicy::Manual);
    let outcome = detector.merge(&local, &remote);

    assert!(!outcome.took_remote);
    assert!(outcome.conflicts.is_empty());
    assert_eq!(
        outcome.snapshot.config.get_value(ConfigSection::Settings, "theme"),
        Some(&json!("dark"))
    );
}

#[test]
fn concurrent_different_leaves_both_survive_under_merge() {
    let local = snapshot(
        "A",
        clock(&[("A", 1)]),
        &[(ConfigSection::Settings, "theme", json!("dark"), 100)],
    );
    let remote = snapshot(
        "B",
        clock(&[("B", 1)]),
        &[(ConfigSection::Settings, "font_size", json!(14), 100)],
    );

    let detector = ConflictDetector::new(ConflictPolicy::Merge);
    let outcome = detector.merge(&local, &remote);

    assert!(outcome.conflicts.is_empty());
    assert_eq!(
        outcome.snapshot.config.get_value(ConfigSection::Settings, "theme"),
        Some(&json!("dark"))
    );
    assert_eq!(
        outcome
            .snapshot
            .config
            .get_value(ConfigSection::Settings, "font_size"),
        Some(&json!(14))
    );
}

#[test]
fn merge_policy_keeps_newer_local_leaf() {
    let local = snapshot(
        "A",
        clock(&[("A", 1)]),
        &[(ConfigSection::Settings, "theme", json!("dark"), 300)],
    );
    let remote = snapshot(
        "B",
        clock(&[("B", 1)]),
        &[(ConfigSection::Settings, "theme", json!("light"), 200)],
    );

    let detector = ConflictDetector::new(ConflictPolicy::Merge);
    let outcome = detector.merge(&local, &remote);

    // Local leaf strictly newer: local wins.
    assert_eq!(
        outcome.snapshot.config.get_value(ConfigSection::Settings, "theme"),
        Some(&json!("dark"))
    );
}

#[test]
fn merge_policy_breaks_leaf_ties_role_free() {
    let local = snapshot(
        "A",
        clock(&[("A", 1)]),
        &[(ConfigSection::Settings, "theme", json!("dark"), 200)],
    );
    let remote = snapshot(
        "B",
        clock(&[("B", 1)]),
        &[(ConfigSection::Settings, "theme", json!("light"), 200)],
    );

    let detector = ConflictDetector::new(ConflictPolicy::Merge);
    let on_a = detector.merge(&local, &remote);
    let on_b = detector.merge(&remote, &local);

    // Equal timestamps break on canonical JSON ordering, so both devices
    // converge on the same value no matter which side was local.
    assert_eq!(
        on_a.snapshot.config.get_value(ConfigSection::Settings, "theme"),
        Some(&json!("light"))
    );
    assert_eq!(
        on_a.snapshot.config.get_value(ConfigSection::Settings, "theme"),
        on_b.snapshot.config.get_value(ConfigSection::Settings, "theme"),
    );
}

#[test]
fn latest_policy_is_wall_clock_best_effort() {
    // `latest` resolves per section on wall-clock time; this is explicitly
    // best effort, not causally sound, since a skewed clock can win.
    let local = snapshot(
        "A",
        clock(&[("A", 5)]),
        &[(ConfigSection::Settings, "theme", json!("dark"), 100)],
    );
    let remote = snapshot(
        "B",
        clock(&[("B", 1)]),
        &[(ConfigSection::Settings, "theme", json!("light"), 900)],
    );

    let detector = ConflictDetector::new(ConflictPolicy::Latest);
    let outcome = detector.merge(&local, &remote);

    assert!(outcome.conflicts.is_empty());
    assert_eq!(
        outcome.snapshot.config.get_value(ConfigSection::Settings, "theme"),
        Some(&json!("light")),
        "newer wall clock wins even though local made more causal edits"
    );
}

#[test]
fn manual_policy_emits_one_conflict_per_section() {
    let local = snapshot(
        "A",
        clock(&[("A", 1)]),
        &[
            (ConfigSection::Settings, "theme", json!("dark"), 100),
            (ConfigSection::Keybindings, "save", json!("ctrl+s"), 100),
        ],
    );
    let remote = snapshot(
        "B",
        clock(&[("B", 1)]),
        &[
            (ConfigSection::Settings, "theme", json!("light"), 100),
            (ConfigSection::Keybindings, "save", json!("cmd+s"), 100),
        ],
    );

    let detector = ConflictDetector::new(ConflictPolicy::Manual);
    let outcome = detector.merge(&local, &remote);

    assert_eq!(outcome.conflicts.len(), 2);
    // Local values stay untouched until resolution.
    assert_eq!(
        outcome.snapshot.config.get_value(ConfigSection::Settings, "theme"),
        Some(&json!("dark"))
    );
    assert_eq!(
        outcome
            .snapshot
            .config
            .get_value(ConfigSection::Keybindings, "save"),
        Some(&json!("ctrl+s"))
    );
}

#[test]
fn manual_policy_applies_nonconflicting_sections() {
    // Remote touched a section local never did: not a conflict.
    let local = snapshot(
        "A",
        clock(&[("A", 1)]),
        &[(ConfigSection::Settings, "theme", json!("dark"), 100)],
    );
    let remote = snapshot(
        "B",
        clock(&[("B", 1)]),
        &[(ConfigSection::Ui, "sidebar", json!("hidden"), 100)],
    );

    let detector = ConflictDetector::new(ConflictPolicy::Manual);
    let outcome = detector.merge(&local, &remote);

    assert!(outcome.conflicts.is_empty());
    assert!(outcome.took_remote);
    assert_eq!(
        outcome.snapshot.config.get_value(ConfigSection::Ui, "sidebar"),
        Some(&json!("hidden"))
    );
}

#[test]
fn concurrent_theme_edit_produces_exactly_one_settings_conflict() {
    // Device A set theme=dark at {A:3,B:1}; device B set theme=light at
    // {A:2,B:2}. Default policy manual: exactly one conflict of type
    // settings with the original values on each side.
    let local = snapshot(
        "A",
        clock(&[("A", 3), ("B", 1)]),
        &[(ConfigSection::Settings, "theme", json!("dark"), 100)],
    );
    let remote = snapshot(
        "B",
        clock(&[("A", 2), ("B", 2)]),
        &[(ConfigSection::Settings, "theme", json!("light"), 100)],
    );

    let detector = ConflictDetector::new(ConflictPolicy::default());
    let outcome = detector.merge(&local, &remote);

    assert_eq!(outcome.conflicts.len(), 1);
    let conflict = &outcome.conflicts[0];
    assert_eq!(conflict.conflict_type, ConfigSection::Settings);
    assert_eq!(conflict.path, "settings");
    assert_eq!(conflict.local.value["theme"], json!("dark"));
    assert_eq!(conflict.remote.value["theme"], json!("light"));
    assert!(!conflict.is_resolved());

    // Joined clock covers both sides.
    assert_eq!(outcome.snapshot.clock.get("A"), 3);
    assert_eq!(outcome.snapshot.clock.get("B"), 2);
}

#[test]
fn resolution_picks_the_decided_side() {
    let local = snapshot(
        "A",
        clock(&[("A", 1)]),
        &[(ConfigSection::Settings, "theme", json!("dark"), 100)],
    );
    let remote = snapshot(
        "B",
        clock(&[("B", 1)]),
        &[(ConfigSection::Settings, "theme", json!("light"), 100)],
    );

    let detector = ConflictDetector::new(ConflictPolicy::Manual);
    let outcome = detector.merge(&local, &remote);
    let mut conflict = outcome.conflicts.into_iter().next().expect("one conflict");

    let value = conflict.resolve(ConflictResolution::Remote);
    assert_eq!(value["theme"], json!("light"));
    assert!(conflict.is_resolved());
    assert_eq!(conflict.resolution, Some(ConflictResolution::Remote));
    assert!(conflict.resolved_at.is_some());
}

#[test]
fn merge_is_deterministic_across_devices() {
    // Both devices merge the same pair (with roles swapped) and must land
    // on the same section contents.
    let a_snapshot = snapshot(
        "A",
        clock(&[("A", 2)]),
        &[
            (ConfigSection::Settings, "theme", json!("dark"), 200),
            (ConfigSection::Settings, "lang", json!("en"), 100),
        ],
    );
    let b_snapshot = snapshot(
        "B",
        clock(&[("B", 2)]),
        &[
            (ConfigSection::Settings, "theme", json!("light"), 200),
            (ConfigSection::Settings, "font_size", json!(12), 100),
        ],
    );

    for policy in [ConflictPolicy::Latest, ConflictPolicy::Merge] {
        let detector = ConflictDetector::new(policy);
        let on_a = detector.merge(&a_snapshot, &b_snapshot);
        let on_b = detector.merge(&b_snapshot, &a_snapshot);
        assert_eq!(
            on_a.snapshot.config.section(ConfigSection::Settings),
            on_b.snapshot.config.section(ConfigSection::Settings),
            "policy {:?} must converge regardless of which side is local",
            policy
        );
    }
}
