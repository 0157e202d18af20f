// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Vector Clocks
//!
//! Per-device monotonic counters establishing causal order between config
//! versions. Only join (elementwise max) is needed; the merge policies
//! never take a meet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result of comparing two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrdering {
    /// Identical counters.
    Equal,
    /// Left clock has seen everything the right has, and more.
    Dominates,
    /// Right clock has seen everything the left has, and more.
    Dominated,
    /// Neither dominates: unordered, possibly conflicting edits.
    Concurrent,
}

/// Mapping of device id to a non-negative event counter.
///
/// A device only ever increments its own entry, and that entry only grows.
/// BTreeMap keeps iteration deterministic across devices, which the merge
/// tie-breaks rely on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    counters: BTreeMap<String, u64>,
}

impl VectorClock {
    /// Creates an empty clock.
    pub fn new() -> Self {
        VectorClock {
            counters: BTreeMap::new(),
        }
    }

    /// Increments the counter for a device.
    pub fn increment(&mut self, device_id: &str) {
        *self.counters.entry(device_id.to_string()).or_insert(0) += 1;
    }

    /// Returns the counter for a device (0 if absent).
    pub fn get(&self, device_id: &str) -> u64 {
        self.counters.get(device_id).copied().unwrap_or(0)
    }

    /// Returns true if no device has recorded an event.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Returns the devices present in this clock.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.counters.keys().map(String::as_str)
    }

    /// Compares two clocks.
    ///
    /// For every device present in either clock: if all of `a`'s counters
    /// are >= `b`'s it dominates, and vice versa; a mixed result is
    /// `Concurrent`.
    pub fn compare(a: &VectorClock, b: &VectorClock) -> ClockOrdering {
        let mut a_ahead = false;
        let mut b_ahead = false;

        for device in a.counters.keys().chain(b.counters.keys()) {
            let av = a.get(device);
            let bv = b.get(device);
            if av > bv {
                a_ahead = true;
            } else if bv > av {
                b_ahead = true;
            }
        }

        match (a_ahead, b_ahead) {
            (false, false) => ClockOrdering::Equal,
            (true, false) => ClockOrdering::Dominates,
            (false, true) => ClockOrdering::Dominated,
            (true, true) => ClockOrdering::Concurrent,
        }
    }

    /// Joins two clocks: elementwise max.
    ///
    /// Commutative, associative and idempotent. Used both to fold a remote
    /// clock into the local one after applying remote changes and to stamp
    /// merged snapshots.
    pub fn merge(a: &VectorClock, b: &VectorClock) -> VectorClock {
        let mut merged = a.counters.clone();
        for (device, counter) in &b.counters {
            let entry = merged.entry(device.clone()).or_insert(0);
            *entry = (*entry).max(*counter);
        }
        VectorClock { counters: merged }
    }

    /// Folds another clock into this one in place (join).
    pub fn merge_from(&mut self, other: &VectorClock) {
        for (device, counter) in &other.counters {
            let entry = self.counters.entry(device.clone()).or_insert(0);
            *entry = (*entry).max(*counter);
        }
    }

    /// Serializes the clock to JSON for storage.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.counters).expect("clock serialization should not fail")
    }

    /// Deserializes a clock from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let counters: BTreeMap<String, u64> = serde_json::from_str(json)?;
        Ok(VectorClock { counters })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_clock_reads_zero() {
        let clock = VectorClock::new();
        assert_eq!(clock.get("a"), 0);
        assert!(clock.is_empty());
    }

    #[test]
    fn increment_is_per_device() {
        let mut clock = VectorClock::new();
        clock.increment("a");
        clock.increment("a");
        clock.increment("b");
        assert_eq!(clock.get("a"), 2);
        assert_eq!(clock.get("b"), 1);
        assert_eq!(clock.get("c"), 0);
    }

    #[test]
    fn compare_detects_dominance() {
        let mut a = VectorClock::new();
        a.increment("x");
        a.increment("x");
        a.increment("y");

        let mut b = VectorClock::new();
        b.increment("x");
        b.increment("y");

        assert_eq!(VectorClock::compare(&a, &b), ClockOrdering::Dominates);
        assert_eq!(VectorClock::compare(&b, &a), ClockOrdering::Dominated);
        assert_eq!(VectorClock::compare(&a, &a), ClockOrdering::Equal);
    }

    #[test]
    fn compare_detects_concurrency() {
        let mut a = VectorClock::new();
        a.increment("x");

        let mut b = VectorClock::new();
        b.increment("y");

        assert_eq!(VectorClock::compare(&a, &b), ClockOrdering::Concurrent);
    }

    #[test]
    fn missing_entries_count_as_zero() {
        let mut a = VectorClock::new();
        a.increment("x");

        let b = VectorClock::new();
        assert_eq!(VectorClock::compare(&a, &b), ClockOrdering::Dominates);
    }

    #[test]
    fn merge_takes_elementwise_max() {
        let mut a = VectorClock::new();
        a.increment("x");
        a.increment("x");

        let mut b = VectorClock::new();
        b.increment("x");
        b.increment("y");

        let merged = VectorClock::merge(&a, &b);
        assert_eq!(merged.get("x"), 2);
        assert_eq!(merged.get("y"), 1);
    }

    #[test]
    fn json_round_trip() {
        let mut clock = VectorClock::new();
        clock.increment("device-a");
        clock.increment("device-b");

        let restored = VectorClock::from_json(&clock.to_json()).unwrap();
        assert_eq!(restored, clock);
    }
}
