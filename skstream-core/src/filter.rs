//! Target Filtering
//!
//! Three filters run on every entity touched by a delta, in order:
//!
//! 1. Group enable: a disabled group drops its deltas and is emptied.
//! 2. Lifecycle state: targets in an excluded `navigation.state` are dropped.
//! 3. Spatial: with a max radius set, targets outside the extent around the
//!    self vessel are dropped.
//!
//! Dropped targets are removed from the store and tagged expired.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::geo::{calc_mapified_extent, in_bounds, Extent, Position};
use crate::liveness::LivenessTags;
use crate::store::{EntityStore, Group};

fn enabled() -> bool {
    true
}

/// Per-group enable flags plus the spatial radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupFilter {
    #[serde(default = "enabled")]
    pub vessels: bool,
    #[serde(default = "enabled")]
    pub atons: bool,
    #[serde(default = "enabled")]
    pub sar: bool,
    #[serde(default = "enabled")]
    pub aircraft: bool,
    /// Radius around the self vessel in meters, `None` for no spatial filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_radius: Option<f64>,
}

impl Default for GroupFilter {
    fn default() -> Self {
        GroupFilter {
            vessels: true,
            atons: true,
            sar: true,
            aircraft: true,
            max_radius: None,
        }
    }
}

impl GroupFilter {
    pub fn is_enabled(&self, group: Group) -> bool {
        match group {
            Group::Vessels => self.vessels,
            Group::Atons => self.atons,
            Group::Sar => self.sar,
            Group::Aircraft => self.aircraft,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterConfig {
    pub groups: GroupFilter,
    /// AIS vessel lifecycle states to exclude (e.g. `moored`)
    pub excluded_states: HashSet<String>,
}

/// Filter configuration plus the current spatial extent
#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    config: FilterConfig,
    extent: Option<Extent>,
}

impl TargetFilter {
    pub fn new(config: FilterConfig) -> Self {
        TargetFilter {
            config,
            extent: None,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Replace the configuration. Removing the radius drops the extent.
    pub fn configure(&mut self, config: FilterConfig) {
        if config.groups.max_radius.is_none() {
            self.extent = None;
        }
        self.config = config;
    }

    pub fn admits_group(&self, group: Group) -> bool {
        self.config.groups.is_enabled(group)
    }

    /// Extent in force, if a radius is set and an extent has been computed
    pub fn spatial_extent(&self) -> Option<Extent> {
        self.config.groups.max_radius.and(self.extent)
    }

    /// Recompute the extent around the self position
    pub fn recalc_extent(&mut self, self_position: Option<Position>) {
        if let (Some(radius), Some(position)) = (self.config.groups.max_radius, self_position) {
            let extent = calc_mapified_extent(position, radius);
            log::debug!("Target extent {:?} (radius {} m)", extent, radius);
            self.extent = Some(extent);
        }
    }

    /// Empty a group and tag every removed key expired
    pub fn clear_group(store: &mut EntityStore, group: Group, tags: &mut LivenessTags) {
        for key in store.clear(group) {
            tags.mark_expired(&key);
        }
    }

    /// Empty every disabled group
    pub fn clear_disabled(&self, store: &mut EntityStore, tags: &mut LivenessTags) {
        for group in Group::iter().filter(|g| !self.admits_group(*g)) {
            if !store.is_empty(group) {
                log::info!("Clearing disabled group {}", group);
                Self::clear_group(store, group, tags);
            }
        }
    }

    /// Filter the entity a delta just touched and tag the result.
    ///
    /// While a spatial extent is in force only targets with a position
    /// inside it are kept.
    pub fn filter_context(
        &self,
        store: &mut EntityStore,
        group: Group,
        key: &str,
        tags: &mut LivenessTags,
    ) {
        if !self.admits_group(group) {
            Self::clear_group(store, group, tags);
            return;
        }
        let Some(target) = store.get(group, key) else {
            return;
        };

        let excluded = target
            .state()
            .is_some_and(|state| self.config.excluded_states.contains(state));
        if excluded {
            log::debug!("{} excluded by state {:?}", key, target.state());
            store.remove(group, key);
            tags.mark_expired(key);
            return;
        }

        let admitted = match self.spatial_extent() {
            Some(extent) => target
                .base()
                .position
                .is_some_and(|position| in_bounds(position, extent)),
            None => true,
        };
        if admitted {
            tags.mark_updated(key);
        } else {
            store.remove(group, key);
            tags.mark_expired(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::Liveness;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn radius_filter(radius: f64) -> TargetFilter {
        TargetFilter::new(FilterConfig {
            groups: GroupFilter {
                max_radius: Some(radius),
                ..Default::default()
            },
            excluded_states: HashSet::new(),
        })
    }

    #[test]
    fn test_group_filter_defaults() {
        let f: GroupFilter = serde_json::from_str(r#"{"aircraft": false}"#).unwrap();
        assert!(f.vessels && f.atons && f.sar);
        assert!(!f.aircraft);
        assert_eq!(f.max_radius, None);
    }

    #[test]
    fn test_no_extent_tags_updated() {
        let mut store = EntityStore::new(at(0));
        store.vessel_or_create("vessels.a", at(0));
        let filter = TargetFilter::default();
        let mut tags = LivenessTags::default();

        filter.filter_context(&mut store, Group::Vessels, "vessels.a", &mut tags);
        assert_eq!(tags.get("vessels.a"), Some(Liveness::Updated));
    }

    #[test]
    fn test_radius_without_extent_is_inactive() {
        let mut store = EntityStore::new(at(0));
        store.vessel_or_create("vessels.a", at(0)).base.position = Some([50.0, 50.0]);
        let filter = radius_filter(1000.0);
        let mut tags = LivenessTags::default();

        assert_eq!(filter.spatial_extent(), None);
        filter.filter_context(&mut store, Group::Vessels, "vessels.a", &mut tags);
        assert_eq!(tags.get("vessels.a"), Some(Liveness::Updated));
    }

    #[test]
    fn test_spatial_filter() {
        let mut store = EntityStore::new(at(0));
        store.vessel_or_create("vessels.near", at(0)).base.position = Some([0.001, 0.001]);
        store.vessel_or_create("vessels.far", at(0)).base.position = Some([1.0, 1.0]);
        store.vessel_or_create("vessels.unknown", at(0));

        let mut filter = radius_filter(10_000.0);
        filter.recalc_extent(Some([0.0, 0.0]));
        let mut tags = LivenessTags::default();

        for key in ["vessels.near", "vessels.far", "vessels.unknown"] {
            filter.filter_context(&mut store, Group::Vessels, key, &mut tags);
        }

        assert_eq!(tags.get("vessels.near"), Some(Liveness::Updated));
        assert_eq!(tags.get("vessels.far"), Some(Liveness::Expired));
        assert!(!store.contains(Group::Vessels, "vessels.far"));
        assert_eq!(tags.get("vessels.unknown"), Some(Liveness::Expired));
        assert!(!store.contains(Group::Vessels, "vessels.unknown"));
    }

    #[test]
    fn test_state_checked_before_position() {
        let mut store = EntityStore::new(at(0));
        let v = store.vessel_or_create("vessels.moored", at(0));
        v.state = Some("moored".into());
        v.base.position = Some([0.0, 0.0]);

        let mut filter = radius_filter(10_000.0);
        filter.recalc_extent(Some([0.0, 0.0]));
        let mut config = filter.config().clone();
        config.excluded_states.insert("moored".into());
        filter.configure(config);
        let mut tags = LivenessTags::default();

        filter.filter_context(&mut store, Group::Vessels, "vessels.moored", &mut tags);
        assert_eq!(tags.get("vessels.moored"), Some(Liveness::Expired));
        assert!(!store.contains(Group::Vessels, "vessels.moored"));
    }

    #[test]
    fn test_disabled_group_is_cleared() {
        let mut store = EntityStore::new(at(0));
        store.aton_or_create("atons.1", at(0));
        store.aton_or_create("atons.2", at(0));
        store.vessel_or_create("vessels.a", at(0));

        let filter = TargetFilter::new(FilterConfig {
            groups: GroupFilter {
                atons: false,
                ..Default::default()
            },
            excluded_states: HashSet::new(),
        });
        let mut tags = LivenessTags::default();
        filter.clear_disabled(&mut store, &mut tags);

        assert!(store.is_empty(Group::Atons));
        assert_eq!(tags.status().expired, vec!["atons.1", "atons.2"]);
        assert!(store.contains(Group::Vessels, "vessels.a"));
    }

    #[test]
    fn test_removing_radius_drops_extent() {
        let mut filter = radius_filter(1000.0);
        filter.recalc_extent(Some([0.0, 0.0]));
        assert!(filter.spatial_extent().is_some());

        filter.configure(FilterConfig::default());
        assert_eq!(filter.spatial_extent(), None);
    }
}
