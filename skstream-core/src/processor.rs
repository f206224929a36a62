//! StreamProcessor - one stream session's state
//!
//! Owns the entity store, liveness tags, filters and course reconstructor
//! for the lifetime of one open stream. The worker creates it on `open`,
//! feeds it deltas and timer ticks, and drops it on `close`.
//!
//! ```text
//!  delta ──► interpreter ──► store ──► filter ──► tags
//!              │                                   │
//!              └─► course / notifications          │
//!                                                  ▼
//!  tick  ──► [housekeeping] ──► emit() ──► UpdateMessage (tags reset)
//! ```
//!
//! Nothing here reads the clock; callers pass `now`.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::course::{CourseReconstructor, NavData, Route};
use crate::delta::{is_self, Delta, PathValue};
use crate::filter::TargetFilter;
use crate::geo::Position;
use crate::interpreter::{self, InterpretContext, Outcome};
use crate::liveness::{self, LivenessTags};
use crate::mode::StreamMode;
use crate::notify::{self, Notification};
use crate::settings::{SettingsChange, SettingsOptions, StreamSettings};
use crate::snapshot::{Snapshot, UpdateMessage};
use crate::store::{EntityStore, Group};

/// Self-vessel paths that can be chosen as preferred sources
pub const PREF_SOURCE_PATHS: [&str; 10] = [
    "environment.wind.speedTrue",
    "environment.wind.speedOverGround",
    "environment.wind.angleTrueGround",
    "environment.wind.angleTrueWater",
    "environment.wind.directionTrue",
    "environment.wind.directionMagnetic",
    "navigation.courseOverGroundTrue",
    "navigation.courseOverGroundMagnetic",
    "navigation.headingTrue",
    "navigation.headingMagnetic",
];

/// Track fetch radius when no spatial filter is set (meters)
pub const DEFAULT_TRACK_RADIUS: f64 = 10_000.0;

/// Counts emitted snapshots; housekeeping is due on every Nth
#[derive(Debug, Clone)]
struct HousekeepingClock {
    counter: u64,
    every: u64,
}

impl HousekeepingClock {
    fn new(every: u64) -> Self {
        HousekeepingClock {
            counter: 0,
            every: every.max(1),
        }
    }

    fn set_every(&mut self, every: u64) {
        self.every = every.max(1);
        self.counter %= self.every;
    }

    /// Advance by one snapshot, returning true if housekeeping is due
    fn tick(&mut self) -> bool {
        let due = self.counter == 0;
        self.counter = (self.counter + 1) % self.every;
        due
    }
}

pub struct StreamProcessor {
    store: EntityStore,
    tags: LivenessTags,
    filter: TargetFilter,
    course: CourseReconstructor,
    routes: HashMap<String, Route>,
    settings: StreamSettings,
    housekeeping: HousekeepingClock,
    /// Self context announced by the server hello
    self_id: Option<String>,
    paths: BTreeSet<String>,
    /// Upstream timestamp of the last update
    playback_time: Option<String>,
    /// A delta arrived since the last snapshot
    dirty: bool,
}

impl StreamProcessor {
    pub fn new(settings: StreamSettings, now: DateTime<Utc>) -> Self {
        StreamProcessor {
            store: EntityStore::new(now),
            tags: LivenessTags::default(),
            filter: TargetFilter::new(settings.filter.clone()),
            course: CourseReconstructor::new(settings.nav),
            routes: HashMap::new(),
            housekeeping: HousekeepingClock::new(settings.housekeeping_every()),
            settings,
            self_id: None,
            paths: BTreeSet::new(),
            playback_time: None,
            dirty: false,
        }
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn mode(&self) -> StreamMode {
        self.settings.mode
    }

    /// No batching interval: emit after every delta message
    pub fn is_immediate(&self) -> bool {
        self.settings.interval_ms.is_none()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn tags(&self) -> &LivenessTags {
        &self.tags
    }

    pub fn nav_data(&self) -> &NavData {
        self.course.nav_data()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_self_id(&mut self, self_id: Option<String>) {
        self.self_id = self_id;
    }

    /// Radius for track history requests
    pub fn track_radius(&self) -> f64 {
        self.settings
            .filter
            .groups
            .max_radius
            .unwrap_or(DEFAULT_TRACK_RADIUS)
    }

    /// Apply a settings change and bring filters and course display in line
    pub fn apply_settings(&mut self, opts: &SettingsOptions) -> SettingsChange {
        let change = self.settings.apply(opts);
        if change.filter_changed {
            self.filter.configure(self.settings.filter.clone());
            self.filter.clear_disabled(&mut self.store, &mut self.tags);
            self.filter.recalc_extent(self.store.self_vessel.base.position);
        }
        if change.nav_changed {
            self.course.set_preferences(self.settings.nav);
        }
        if change.interval_changed {
            self.housekeeping.set_every(self.settings.housekeeping_every());
        }
        change
    }

    /// Apply one delta message. Returns notifications raised by it.
    pub fn process_delta(&mut self, delta: &Delta, now: DateTime<Utc>) -> Vec<Notification> {
        let mut notifications = Vec::new();
        self.dirty = true;

        for update in &delta.updates {
            if update.values.is_empty() {
                continue;
            }
            if let Some(timestamp) = &update.timestamp {
                self.playback_time = Some(timestamp.clone());
            }
            let Some(context) = delta.context.as_deref() else {
                continue;
            };
            for pv in &update.values {
                if is_self(context, self.self_id.as_deref()) {
                    if let Some(notification) = self.apply_self(pv, now) {
                        notifications.push(notification);
                    }
                } else if let Some(group) = Group::from_context(context) {
                    self.apply_target(group, context, pv, now);
                }
            }
        }
        notifications
    }

    fn interpret_context(&self, now: DateTime<Utc>, append_track: bool) -> InterpretContext {
        InterpretContext {
            now,
            max_track: self.settings.ages.max_track,
            stale_age_ms: self.settings.ages.stale_age_ms,
            append_track,
        }
    }

    fn apply_self(&mut self, pv: &PathValue, now: DateTime<Utc>) -> Option<Notification> {
        let source_path = if pv.path.contains("course") {
            pv.path.split('.').take(2).collect::<Vec<_>>().join(".")
        } else {
            pv.path.clone()
        };
        if PREF_SOURCE_PATHS.contains(&source_path.as_str()) {
            self.paths.insert(source_path);
        }

        let ctx = self.interpret_context(now, false);
        let vessel = &mut self.store.self_vessel;
        let outcome = interpreter::apply(vessel, pv, &ctx);
        interpreter::apply_preferred(vessel, pv, &self.settings.preferred_paths);

        match outcome {
            Outcome::CourseApi => self
                .course
                .on_course_api_update(self.store.self_vessel.course_api.payload(), &self.routes),
            Outcome::CourseCalculation(field) => {
                self.course.on_scalar_course_field(&field, &pv.value);
            }
            _ => {}
        }

        notify::classify(pv)
    }

    fn apply_target(&mut self, group: Group, key: &str, pv: &PathValue, now: DateTime<Utc>) {
        if !self.filter.admits_group(group) {
            TargetFilter::clear_group(&mut self.store, group, &mut self.tags);
            return;
        }

        let ctx = self.interpret_context(now, true);
        match group {
            Group::Vessels => {
                let vessel = self.store.vessel_or_create(key, now);
                interpreter::apply(vessel, pv, &ctx);
                interpreter::apply_preferred(vessel, pv, &self.settings.preferred_paths);
            }
            Group::Atons => {
                interpreter::apply(self.store.aton_or_create(key, now), pv, &ctx);
            }
            Group::Sar => {
                interpreter::apply(self.store.sar_or_create(key, now), pv, &ctx);
            }
            Group::Aircraft => {
                interpreter::apply(self.store.aircraft_or_create(key, now), pv, &ctx);
            }
        }

        self.filter
            .filter_context(&mut self.store, group, key, &mut self.tags);
    }

    /// Age out non-self targets
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        liveness::sweep(&mut self.store, &self.settings.ages, now, &mut self.tags);
    }

    /// Build the snapshot for this cycle and start the next one.
    ///
    /// Housekeeping (sweep and extent recompute) runs first when due, so
    /// its tags are part of this snapshot.
    pub fn emit(&mut self, now: DateTime<Utc>) -> UpdateMessage {
        if self.housekeeping.tick() {
            self.sweep(now);
            self.filter
                .recalc_extent(self.store.self_vessel.base.position);
        }

        let timestamp = self.settings.mode.snapshot_timestamp(
            self.playback_time.as_deref(),
            self.store.self_vessel.base.last_updated,
        );
        let message = UpdateMessage {
            playback: self.settings.mode.is_playback(),
            result: Snapshot {
                store: self.store.clone(),
                ais_status: self.tags.take(),
                paths: self.paths.clone(),
                nav_data: self.course.nav_data().clone(),
            },
            timestamp,
        };

        self.store.self_vessel.resource_updates.clear();
        self.dirty = false;
        message
    }

    /// Relabel the self vessel (`"self"`) or an AIS target
    pub fn rename(&mut self, context: &str, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let vessel = if context == "self" {
            Some(&mut self.store.self_vessel)
        } else {
            self.store.ais_targets.get_mut(context)
        };
        match vessel {
            Some(vessel) => {
                vessel.base.name = Some(name.to_string());
                true
            }
            None => false,
        }
    }

    /// Replace AIS target tracks with fetched history.
    ///
    /// Only targets already in the store are updated; the current position
    /// is appended after the fetched points.
    pub fn apply_tracks(&mut self, tracks: HashMap<String, Vec<Vec<Position>>>) {
        let max_track = self.settings.ages.max_track;
        let mut applied = 0;
        for (key, segments) in tracks {
            if let Some(vessel) = self.store.ais_targets.get_mut(&key) {
                vessel.base.track.replace(segments);
                if let Some(position) = vessel.base.position {
                    vessel.base.track.append(position, max_track);
                }
                applied += 1;
            }
        }
        log::debug!("Applied fetched tracks to {} targets", applied);
    }

    /// Replace the known route resources and re-resolve the active route
    pub fn set_routes(&mut self, routes: Vec<Route>) {
        self.routes = routes.into_iter().map(|r| (r.id.clone(), r)).collect();
        self.course
            .on_course_api_update(self.store.self_vessel.course_api.payload(), &self.routes);
    }
}
