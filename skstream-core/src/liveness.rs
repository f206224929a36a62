//! Target Liveness
//!
//! Each output cycle every touched or aged entity gets exactly one tag:
//! updated, stale or expired. Tags accumulate between snapshots and are
//! reset when a snapshot is emitted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::store::{EntityStore, Group};

/// Liveness of one entity within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Updated,
    Stale,
    Expired,
}

/// Age thresholds and track length for non-self targets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAges {
    /// Remove a target this long after its last update
    pub max_age_ms: u64,
    /// Mark a target stale this long after its last update
    pub stale_age_ms: u64,
    /// Max points in the active track segment
    pub max_track: usize,
}

impl Default for TargetAges {
    fn default() -> Self {
        TargetAges {
            max_age_ms: 540_000,   // 9 minutes
            stale_age_ms: 360_000, // 6 minutes
            max_track: 20,
        }
    }
}

/// Tags accumulated since the last snapshot, one per context key
#[derive(Debug, Clone, Default)]
pub struct LivenessTags {
    tags: HashMap<String, Liveness>,
}

impl LivenessTags {
    /// Tag a key updated. A key expired earlier in the cycle and then
    /// re-created is updated again.
    pub fn mark_updated(&mut self, key: &str) {
        self.tags.insert(key.to_string(), Liveness::Updated);
    }

    /// Tag a key stale unless it already carries a tag this cycle
    pub fn mark_stale(&mut self, key: &str) {
        self.tags
            .entry(key.to_string())
            .or_insert(Liveness::Stale);
    }

    pub fn mark_expired(&mut self, key: &str) {
        self.tags.insert(key.to_string(), Liveness::Expired);
    }

    pub fn get(&self, key: &str) -> Option<Liveness> {
        self.tags.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Snapshot the tags as sorted key lists
    pub fn status(&self) -> AisStatus {
        let mut status = AisStatus::default();
        for (key, liveness) in &self.tags {
            match liveness {
                Liveness::Updated => status.updated.push(key.clone()),
                Liveness::Stale => status.stale.push(key.clone()),
                Liveness::Expired => status.expired.push(key.clone()),
            }
        }
        status.updated.sort();
        status.stale.sort();
        status.expired.sort();
        status
    }

    /// Return the current status and start a new cycle
    pub fn take(&mut self) -> AisStatus {
        let status = self.status();
        self.tags.clear();
        status
    }
}

/// Per-snapshot liveness lists as published to consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AisStatus {
    pub updated: Vec<String>,
    pub stale: Vec<String>,
    pub expired: Vec<String>,
}

/// Age every non-self entity.
///
/// `elapsed >= max_age` removes the entity and tags it expired, otherwise
/// `elapsed >= stale_age` tags it stale.
pub fn sweep(store: &mut EntityStore, ages: &TargetAges, now: DateTime<Utc>, tags: &mut LivenessTags) {
    for group in Group::iter() {
        let mut expired = Vec::new();
        store.for_each(group, |key, target| {
            let age = target.base().age_ms(now);
            if age >= ages.max_age_ms {
                expired.push(key.to_string());
            } else if age >= ages.stale_age_ms {
                tags.mark_stale(key);
            }
        });
        for key in expired {
            log::debug!("{} expired", key);
            store.remove(group, &key);
            tags.mark_expired(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn short_ages() -> TargetAges {
        TargetAges {
            max_age_ms: 9000,
            stale_age_ms: 6000,
            max_track: 20,
        }
    }

    #[test]
    fn test_stale_then_expired() {
        let mut store = EntityStore::new(at(0));
        store.vessel_or_create("vessels.a", at(0));
        let ages = short_ages();

        let mut tags = LivenessTags::default();
        sweep(&mut store, &ages, at(7000), &mut tags);
        assert!(store.contains(Group::Vessels, "vessels.a"));
        assert_eq!(tags.get("vessels.a"), Some(Liveness::Stale));

        let mut tags = LivenessTags::default();
        sweep(&mut store, &ages, at(10_000), &mut tags);
        assert!(!store.contains(Group::Vessels, "vessels.a"));
        assert_eq!(tags.get("vessels.a"), Some(Liveness::Expired));
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let mut store = EntityStore::new(at(0));
        store.aircraft_or_create("aircraft.1", at(0));
        store.sar_or_create("sar.1", at(3000));
        let mut tags = LivenessTags::default();

        sweep(&mut store, &short_ages(), at(9000), &mut tags);
        assert!(!store.contains(Group::Aircraft, "aircraft.1"));
        assert_eq!(tags.get("aircraft.1"), Some(Liveness::Expired));
        assert!(store.contains(Group::Sar, "sar.1"));
        assert_eq!(tags.get("sar.1"), Some(Liveness::Stale));
    }

    #[test]
    fn test_fresh_entities_untagged() {
        let mut store = EntityStore::new(at(0));
        store.aton_or_create("atons.1", at(5000));
        let mut tags = LivenessTags::default();
        sweep(&mut store, &short_ages(), at(6000), &mut tags);
        assert!(tags.is_empty());
    }

    #[test]
    fn test_updated_wins_over_stale() {
        let mut tags = LivenessTags::default();
        tags.mark_updated("a");
        tags.mark_stale("a");
        assert_eq!(tags.get("a"), Some(Liveness::Updated));

        tags.mark_stale("b");
        tags.mark_updated("b");
        assert_eq!(tags.get("b"), Some(Liveness::Updated));

        tags.mark_stale("c");
        tags.mark_expired("c");
        assert_eq!(tags.get("c"), Some(Liveness::Expired));
    }

    #[test]
    fn test_take_resets() {
        let mut tags = LivenessTags::default();
        tags.mark_updated("b");
        tags.mark_updated("a");
        tags.mark_expired("c");

        let status = tags.take();
        assert_eq!(status.updated, vec!["a", "b"]);
        assert_eq!(status.expired, vec!["c"]);
        assert!(status.stale.is_empty());
        assert!(tags.is_empty());
    }
}
