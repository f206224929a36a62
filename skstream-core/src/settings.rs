//! Worker settings
//!
//! [`SettingsOptions`] is the wire form of the `settings` command (and the
//! settings part of `open`). Every field is optional; absent fields leave
//! the current value untouched. [`StreamSettings`] is the resolved state.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::course::NavPreferences;
use crate::filter::{FilterConfig, GroupFilter};
use crate::liveness::TargetAges;
use crate::mode::StreamMode;
use crate::units::{DistanceUnit, SpeedUnit};

/// Default batching interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// Self-vessel paths chosen as the source for derived values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferredPaths {
    /// Path whose value becomes `orientation`
    pub heading: Option<String>,
    /// Path whose value becomes `wind.tws`
    pub tws: Option<String>,
    /// Path whose value becomes `wind.direction`
    pub twd: Option<String>,
    pub course: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Selections {
    pub preferred_paths: Option<PreferredPaths>,
    pub ais_max_age: Option<u64>,
    pub ais_stale_age: Option<u64>,
    pub ais_max_track: Option<usize>,
    pub signalk: Option<GroupFilter>,
    /// Lifecycle states to exclude
    pub ais_state: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Units {
    pub distance: Option<DistanceUnit>,
    pub speed: Option<SpeedUnit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsOptions {
    /// Batching interval in ms; 0 emits after every delta message
    pub interval: Option<u64>,
    pub playback: Option<bool>,
    pub selections: Option<Selections>,
    pub units: Option<Units>,
    pub use_magnetic: Option<bool>,
}

/// What an applied settings change affects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    /// Timers must be restarted
    pub interval_changed: bool,
    /// Filters must be re-applied
    pub filter_changed: bool,
    /// Course display preferences changed
    pub nav_changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// Batching interval, `None` for immediate mode
    pub interval_ms: Option<u64>,
    pub mode: StreamMode,
    pub preferred_paths: PreferredPaths,
    pub ages: TargetAges,
    pub filter: FilterConfig,
    pub nav: NavPreferences,
}

impl Default for StreamSettings {
    fn default() -> Self {
        StreamSettings {
            interval_ms: Some(DEFAULT_INTERVAL_MS),
            mode: StreamMode::Realtime,
            preferred_paths: PreferredPaths::default(),
            ages: TargetAges::default(),
            filter: FilterConfig::default(),
            nav: NavPreferences::default(),
        }
    }
}

impl StreamSettings {
    pub fn apply(&mut self, opts: &SettingsOptions) -> SettingsChange {
        let mut change = SettingsChange::default();

        if let Some(interval) = opts.interval {
            let interval_ms = (interval > 0).then_some(interval);
            change.interval_changed = interval_ms != self.interval_ms;
            self.interval_ms = interval_ms;
        }
        if let Some(playback) = opts.playback {
            self.mode = StreamMode::from_playback(playback);
        }

        if let Some(selections) = &opts.selections {
            if let Some(paths) = &selections.preferred_paths {
                self.preferred_paths = paths.clone();
            }
            if let Some(max_age) = selections.ais_max_age {
                self.ages.max_age_ms = max_age;
            }
            if let Some(stale_age) = selections.ais_stale_age {
                self.ages.stale_age_ms = stale_age;
            }
            if let Some(max_track) = selections.ais_max_track {
                self.ages.max_track = max_track;
            }
            if let Some(groups) = &selections.signalk {
                change.filter_changed |= *groups != self.filter.groups;
                self.filter.groups = groups.clone();
            }
            if let Some(states) = &selections.ais_state {
                let states: HashSet<String> = states.iter().cloned().collect();
                change.filter_changed |= states != self.filter.excluded_states;
                self.filter.excluded_states = states;
            }
        }

        let nav_before = self.nav;
        if let Some(units) = &opts.units {
            if let Some(distance) = units.distance {
                self.nav.distance = distance;
            }
            if let Some(speed) = units.speed {
                self.nav.speed = speed;
            }
        }
        if let Some(use_magnetic) = opts.use_magnetic {
            self.nav.use_magnetic = use_magnetic;
        }
        change.nav_changed = nav_before != self.nav;

        change
    }

    /// Housekeeping runs about once a minute
    pub fn housekeeping_every(&self) -> u64 {
        match self.interval_ms {
            Some(ms) => (60_000 / ms).max(1),
            None => 60,
        }
    }
}
