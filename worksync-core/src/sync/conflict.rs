// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Conflict Detection and Merge Policies
//!
//! Classifies a (local, remote) snapshot pair by clock ordering and merges
//! per the configured policy. Dominated sides are replaced wholesale;
//! concurrent edits resolve per top-level section (`latest`), per leaf
//! (`merge`) or become explicit [`SyncConflict`] records (`manual`).
//!
//! Every rule here is deterministic: identical inputs produce identical
//! output on every device. Ordering comes from BTreeMap iteration and ties
//! break on canonical JSON ordering, never on which side is "local".

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::clock::{ClockOrdering, VectorClock};
use crate::config::model::{ConfigSection, ConfigSnapshot};

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Policy applied when clocks are concurrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Newer wall-clock section timestamp wins. Best effort only: wall
    /// clocks are not causally sound.
    Latest,
    /// Leaf-level deep merge; differing leaves keep remote unless the local
    /// leaf's own timestamp is strictly newer.
    Merge,
    /// No automatic resolution; each concurrently-modified section becomes
    /// a [`SyncConflict`] awaiting an explicit user decision.
    #[default]
    Manual,
}

/// User decision applied to a [`SyncConflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    /// Keep the local value.
    Local,
    /// Take the remote value.
    Remote,
    /// Leaf-level merge of both values.
    Merge,
}

/// One side of a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictSide {
    /// The section tree on that side (`null` when the side never had it).
    pub value: Value,
    /// Newest leaf timestamp in the section on that side.
    pub timestamp: u64,
    /// Device that made the newest write on that side.
    pub device_id: String,
    /// Clock of the snapshot that side came from.
    pub vector_clock: VectorClock,
    /// Leaf timestamps within the section, for merge resolution.
    pub path_timestamps: BTreeMap<String, u64>,
}

/// A concurrent edit awaiting explicit resolution.
///
/// Created only when clocks are incomparable; destroyed only by
/// [`resolve`](SyncConflict::resolve), never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Unique conflict id.
    pub id: String,
    /// Top-level path (section name).
    pub path: String,
    /// Section kind.
    pub conflict_type: ConfigSection,
    /// Local side at detection time.
    pub local: ConflictSide,
    /// Remote side at detection time.
    pub remote: ConflictSide,
    /// Decision, once made.
    pub resolution: Option<ConflictResolution>,
    /// Value the decision produced.
    pub resolved_value: Option<Value>,
    /// Unix timestamp of the decision.
    pub resolved_at: Option<u64>,
}

impl SyncConflict {
    /// Returns true once a decision has been applied.
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Applies a decision, computing the winning value.
    pub fn resolve(&mut self, resolution: ConflictResolution) -> Value {
        let value = match resolution {
            ConflictResolution::Local => self.local.value.clone(),
            ConflictResolution::Remote => self.remote.value.clone(),
            ConflictResolution::Merge => merge_values(
                &self.local.value,
                &self.remote.value,
                "",
                &self.local.path_timestamps,
                &self.remote.path_timestamps,
            ),
        };
        self.resolution = Some(resolution);
        self.resolved_value = Some(value.clone());
        self.resolved_at = Some(current_timestamp());
        value
    }
}

/// Result of merging a remote snapshot into the local one.
#[derive(Debug)]
pub struct MergeOutcome {
    /// The snapshot to apply; clock is the join of both inputs.
    pub snapshot: ConfigSnapshot,
    /// Conflicts produced (policy `manual` only).
    pub conflicts: Vec<SyncConflict>,
    /// True when any remote data was taken into the result.
    pub took_remote: bool,
}

/// Applies the configured merge policy to snapshot pairs.
#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector {
    policy: ConflictPolicy,
}

impl ConflictDetector {
    /// Creates a detector with the given policy.
    pub fn new(policy: ConflictPolicy) -> Self {
        ConflictDetector { policy }
    }

    /// Returns the configured policy.
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Merges `remote` into `local` per clock ordering and policy.
    pub fn merge(&self, local: &ConfigSnapshot, remote: &ConfigSnapshot) -> MergeOutcome {
        let joined = VectorClock::merge(&local.clock, &remote.clock);

        match VectorClock::compare(&local.clock, &remote.clock) {
            ClockOrdering::Equal | ClockOrdering::Dominates => {
                // Local has seen everything remote has.
                let mut snapshot = local.clone();
                snapshot.clock = joined;
                MergeOutcome {
                    snapshot,
                    conflicts: Vec::new(),
                    took_remote: false,
                }
            }
            ClockOrdering::Dominated => {
                // Remote strictly newer: take it wholesale.
                let mut snapshot = remote.clone();
                snapshot.clock = joined;
                MergeOutcome {
                    snapshot,
                    conflicts: Vec::new(),
                    took_remote: true,
                }
            }
            ClockOrdering::Concurrent => self.merge_concurrent(local, remote, joined),
        }
    }

    fn merge_concurrent(
        &self,
        local: &ConfigSnapshot,
        remote: &ConfigSnapshot,
        joined: VectorClock,
    ) -> MergeOutcome {
        let mut merged = local.clone();
        merged.clock = joined;
        merged.config.absorb_path_timestamps(&remote.config);
        if remote.config.last_modified.timestamp > merged.config.last_modified.timestamp {
            merged.config.last_modified = remote.config.last_modified.clone();
        }

        let mut conflicts = Vec::new();
        let mut took_remote = false;

        for section in ConfigSection::all() {
            let local_value = local.config.section(section);
            let remote_value = remote.config.section(section);

            let (local_value, remote_value) = match (local_value, remote_value) {
                (None, None) => continue,
                // Only local has it: keep as-is.
                (Some(_), None) => continue,
                // Only remote has it: not a conflict, take it.
                (None, Some(r)) => {
                    merged.config.put_section(section, r.clone());
                    took_remote = true;
                    continue;
                }
                (Some(l), Some(r)) => (l, r),
            };

            if local_value == remote_value {
                continue;
            }

            let local_ts = local.config.section_timestamp(section);
            let remote_ts = remote.config.section_timestamp(section);

            match self.policy {
                ConflictPolicy::Latest => {
                    if remote_wins_latest(local_value, remote_ts, remote_value, local_ts) {
                        merged.config.put_section(section, remote_value.clone());
                        took_remote = true;
                    }
                }
                ConflictPolicy::Merge => {
                    let local_paths = section_timestamps(&local.config, section);
                    let remote_paths = section_timestamps(&remote.config, section);
                    let merged_value =
                        merge_values(local_value, remote_value, "", &local_paths, &remote_paths);
                    if merged_value != *local_value {
                        took_remote = true;
                    }
                    merged.config.put_section(section, merged_value);
                }
                ConflictPolicy::Manual => {
                    // Leave the section untouched; record the conflict.
                    conflicts.push(SyncConflict {
                        id: Uuid::new_v4().to_string(),
                        path: section.as_str().to_string(),
                        conflict_type: section,
                        local: ConflictSide {
                            value: local_value.clone(),
                            timestamp: local_ts,
                            device_id: local.config.last_modified.device_id.clone(),
                            vector_clock: local.clock.clone(),
                            path_timestamps: section_timestamps(&local.config, section),
                        },
                        remote: ConflictSide {
                            value: remote_value.clone(),
                            timestamp: remote_ts,
                            device_id: remote.config.last_modified.device_id.clone(),
                            vector_clock: remote.clock.clone(),
                            path_timestamps: section_timestamps(&remote.config, section),
                        },
                        resolution: None,
                        resolved_value: None,
                        resolved_at: None,
                    });
                }
            }
        }

        MergeOutcome {
            snapshot: merged,
            conflicts,
            took_remote,
        }
    }
}

/// Decides the `latest` policy winner for one section.
///
/// Newer timestamp wins; equal timestamps break the tie on canonical JSON
/// ordering of the two values, so every device picks the same side.
fn remote_wins_latest(
    local_value: &Value,
    remote_ts: u64,
    remote_value: &Value,
    local_ts: u64,
) -> bool {
    if remote_ts != local_ts {
        return remote_ts > local_ts;
    }
    canonical_json(remote_value) > canonical_json(local_value)
}

fn canonical_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn section_timestamps(
    config: &crate::config::model::WorkspaceConfig,
    section: ConfigSection,
) -> BTreeMap<String, u64> {
    config
        .section_path_timestamps(section)
        .map(|(path, ts)| (path.to_string(), ts))
        .collect()
}

/// Leaf-level deep merge.
///
/// Objects merge key-by-key. For a leaf present in both sides with
/// differing values, the remote leaf wins unless the local leaf's own
/// timestamp is strictly newer. Equal timestamps fall back to canonical
/// JSON ordering: "remote wins" would mean each device keeps the other's
/// value and the two would never converge.
fn merge_values(
    local: &Value,
    remote: &Value,
    path: &str,
    local_ts: &BTreeMap<String, u64>,
    remote_ts: &BTreeMap<String, u64>,
) -> Value {
    match (local, remote) {
        (Value::Object(local_map), Value::Object(remote_map)) => {
            let mut out = serde_json::Map::new();
            let keys: std::collections::BTreeSet<&String> =
                local_map.keys().chain(remote_map.keys()).collect();
            for key in keys {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                let merged = match (local_map.get(key), remote_map.get(key)) {
                    (Some(l), Some(r)) => merge_values(l, r, &child_path, local_ts, remote_ts),
                    (Some(l), None) => l.clone(),
                    (None, Some(r)) => r.clone(),
                    (None, None) => continue,
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (l, r) if l == r => l.clone(),
        (l, r) => {
            let lt = local_ts.get(path).copied().unwrap_or(0);
            let rt = remote_ts.get(path).copied().unwrap_or(0);
            if lt > rt {
                l.clone()
            } else if rt > lt {
                r.clone()
            } else if canonical_json(l) > canonical_json(r) {
                l.clone()
            } else {
                r.clone()
            }
        }
    }
}
