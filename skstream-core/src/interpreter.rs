//! Delta Interpreter
//!
//! Maps a flat `path`/`value` pair onto the right field of an entity record.
//!
//! Dispatch order for every record type:
//!
//! ```text
//!   ""                   -> identity object (name, mmsi, ...)
//!   navigation.position  -> position fix (+ track append)
//!   exact table          -> typed setter
//!   prefix rules         -> navigation.course.*, resources.*, ...
//!   anything else        -> properties[path]
//! ```
//!
//! The tables are built once per record type. Unknown paths never fail;
//! they end up in the property bag.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::delta::PathValue;
use crate::entity::{Aircraft, AtoN, SarBeacon, Target, TargetBase, TargetType, Vessel};
use crate::geo::{self, Position};
use crate::settings::PreferredPaths;
use crate::units::angle_to_direction;

/// Typed setter for an exact path
pub type Setter<T> = fn(&mut T, &Value);

/// Setter for a path family; receives the full path
pub type PrefixSetter<T> = fn(&mut T, &str, &Value) -> Outcome;

/// What a single path/value pair did to its record
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing written (e.g. null position)
    Ignored,
    Stored,
    /// New position fix
    Position(Position),
    /// One of the Course API parts (activeRoute, nextPoint, previousPoint)
    CourseApi,
    /// A calculated course value, by field name (e.g. `crossTrackError`)
    CourseCalculation(String),
    /// A `resources.*` delta was queued on the record
    Resource,
}

/// Path dispatch table for one record type
pub struct PathTable<T> {
    exact: HashMap<&'static str, Setter<T>>,
    prefix: Vec<(&'static str, PrefixSetter<T>)>,
}

impl<T> PathTable<T> {
    fn new(exact: &[(&'static str, Setter<T>)], prefix: &[(&'static str, PrefixSetter<T>)]) -> Self {
        PathTable {
            exact: exact.iter().copied().collect(),
            prefix: prefix.to_vec(),
        }
    }
}

/// Per-call parameters of the interpreter
#[derive(Debug, Clone, Copy)]
pub struct InterpretContext {
    pub now: DateTime<Utc>,
    /// Max points in the active track segment
    pub max_track: usize,
    /// A fix arriving after this much silence starts a new track segment
    pub stale_age_ms: u64,
    /// Self vessel positions are not tracked
    pub append_track: bool,
}

/// A record type the interpreter can write to
pub trait Interpret: Target + Sized + 'static {
    fn table() -> &'static PathTable<Self>;

    /// Apply the identity object sent on the empty path.
    /// Returns false if the value carried nothing usable.
    fn apply_identity(&mut self, value: &Value) -> bool;
}

/// Apply one path/value pair to a record
pub fn apply<T: Interpret>(target: &mut T, pv: &PathValue, ctx: &InterpretContext) -> Outcome {
    let path = pv.path.as_str();
    let value = &pv.value;

    let outcome = if path.is_empty() {
        if target.apply_identity(value) {
            Outcome::Stored
        } else {
            Outcome::Ignored
        }
    } else if path == "navigation.position" {
        apply_position(target, value, ctx)
    } else if let Some(setter) = T::table().exact.get(path) {
        setter(target, value);
        Outcome::Stored
    } else if let Some((_, rule)) = T::table().prefix.iter().find(|(p, _)| path.starts_with(p)) {
        rule(target, path, value)
    } else {
        target
            .base_mut()
            .properties
            .insert(path.to_string(), value.clone());
        Outcome::Stored
    };

    if outcome != Outcome::Ignored {
        target.base_mut().touch(ctx.now);
    }
    outcome
}

fn apply_position<T: Target>(target: &mut T, value: &Value, ctx: &InterpretContext) -> Outcome {
    let Some(position) = geo::position_from_value(value) else {
        return Outcome::Ignored;
    };
    let position = geo::normalise_coords(position);
    let base = target.base_mut();
    let was_stale = base.age_ms(ctx.now) >= ctx.stale_age_ms;

    base.position = Some(position);
    base.position_received = true;
    if ctx.append_track {
        if was_stale && !base.track.is_empty() {
            base.track.start_segment();
        }
        base.track.append(position, ctx.max_track);
    }
    Outcome::Position(position)
}

/// Vessel follow-up for paths chosen as preferred sources in settings
pub fn apply_preferred(vessel: &mut Vessel, pv: &PathValue, preferred: &PreferredPaths) {
    let path = pv.path.as_str();
    if preferred.heading.as_deref() == Some(path) {
        vessel.orientation = num(&pv.value);
    }
    if preferred.tws.as_deref() == Some(path) {
        vessel.wind.tws = num(&pv.value);
    }
    if preferred.twd.as_deref() == Some(path) {
        let value = num(&pv.value);
        vessel.wind.direction = match path {
            "environment.wind.angleTrueGround" | "environment.wind.angleTrueWater" => {
                let heading = vessel.heading_or_cog().unwrap_or(0.0);
                value.map(|angle| angle_to_direction(angle, heading))
            }
            _ => value,
        };
    }
}

fn num(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

// ---- Vessel ----

static VESSEL_PATHS: Lazy<PathTable<Vessel>> = Lazy::new(|| {
    PathTable::<Vessel>::new(
        &[
            ("name", |v, x| v.base.name = text(x)),
            ("mmsi", |v, x| v.base.mmsi = text(x)),
            ("communication.callsignVhf", |v, x| v.base.callsign = text(x)),
            ("navigation.state", |v, x| v.state = text(x)),
            ("navigation.speedOverGround", |v, x| v.sog = num(x)),
            ("navigation.courseOverGroundTrue", |v, x| v.cog_true = num(x)),
            ("navigation.courseOverGroundMagnetic", |v, x| v.cog_magnetic = num(x)),
            ("navigation.headingTrue", |v, x| v.heading_true = num(x)),
            ("navigation.headingMagnetic", |v, x| v.heading_magnetic = num(x)),
            ("environment.wind.angleApparent", |v, x| v.wind.awa = num(x)),
            ("environment.wind.speedApparent", |v, x| v.wind.aws = num(x)),
            ("environment.wind.speedTrue", |v, x| v.wind.speed_true = num(x)),
            ("environment.wind.speedOverGround", |v, x| v.wind.sog = num(x)),
            ("environment.wind.directionTrue", |v, x| v.wind.twd = num(x)),
            ("environment.wind.directionMagnetic", |v, x| v.wind.mwd = num(x)),
            ("environment.mode", |v, x| v.mode = text(x)),
            ("navigation.anchor.position", |v, x| {
                v.anchor.position = geo::position_from_value(x)
            }),
            ("navigation.anchor.maxRadius", |v, x| v.anchor.max_radius = num(x)),
            ("navigation.anchor.currentRadius", |v, x| v.anchor.radius = num(x)),
            ("steering.autopilot.mode", |v, x| v.autopilot.mode = text(x)),
            ("steering.autopilot.enabled", |v, x| v.autopilot.enabled = x.as_bool()),
            ("steering.autopilot.availableModes", |v, x| {
                v.autopilot.mode_list = x
                    .as_array()
                    .map(|modes| modes.iter().filter_map(text).collect())
                    .unwrap_or_default()
            }),
        ],
        &[
            ("navigation.course.", vessel_course),
            ("navigation.closestApproach", |v, _, x| {
                v.closest_approach = x.as_object().cloned().unwrap_or_default();
                Outcome::Stored
            }),
            ("resources.", |v, path, x| {
                v.resource_updates.push(json!({ "path": path, "value": x }));
                Outcome::Resource
            }),
        ],
    )
});

/// `navigation.course.*`: Course API parts and calculated values
fn vessel_course(vessel: &mut Vessel, path: &str, value: &Value) -> Outcome {
    let rest = &path["navigation.course.".len()..];
    let mut segments = rest.split('.');
    let part = segments.next().unwrap_or_default();
    let has_key = segments.next().is_some();

    match part {
        "calcValues" | "calculations" => {
            let field = last_segment(rest).to_string();
            vessel.course.insert(field.clone(), value.clone());
            Outcome::CourseCalculation(field)
        }
        "activeRoute" | "nextPoint" | "previousPoint" => {
            let key = has_key.then(|| last_segment(rest));
            vessel.course_api.set(part, key, value);
            Outcome::CourseApi
        }
        _ => {
            vessel.course.insert(rest.to_string(), value.clone());
            Outcome::Stored
        }
    }
}

impl Interpret for Vessel {
    fn table() -> &'static PathTable<Self> {
        &VESSEL_PATHS
    }

    fn apply_identity(&mut self, value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        if let Some(name) = obj.get("name") {
            self.base.name = text(name);
        }
        if let Some(mmsi) = obj.get("mmsi") {
            self.base.mmsi = text(mmsi);
        }
        if let Some(buddy) = obj.get("buddy").and_then(Value::as_bool) {
            self.buddy = buddy;
        }
        true
    }
}

// ---- AtoN ----

static ATON_PATHS: Lazy<PathTable<AtoN>> = Lazy::new(|| {
    PathTable::<AtoN>::new(
        &[
            ("name", |a, x| a.base.name = text(x)),
            ("mmsi", |a, x| a.base.mmsi = text(x)),
            ("atonType", |a, x| a.aton_type = TargetType::from_value(x)),
        ],
        &[],
    )
});

impl Interpret for AtoN {
    fn table() -> &'static PathTable<Self> {
        &ATON_PATHS
    }

    fn apply_identity(&mut self, value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        if let Some(name) = obj.get("name") {
            self.base.name = text(name);
        }
        if let Some(mmsi) = obj.get("mmsi") {
            self.base.mmsi = text(mmsi);
        }
        if let Some(aton_type) = obj.get("atonType") {
            self.aton_type = TargetType::from_value(aton_type);
        }
        true
    }
}

// ---- SAR ----

static SAR_PATHS: Lazy<PathTable<SarBeacon>> = Lazy::new(|| {
    PathTable::<SarBeacon>::new(
        &[
            ("name", |s, x| s.base.name = text(x)),
            ("mmsi", |s, x| s.base.mmsi = text(x)),
            ("communication.callsignVhf", |s, x| s.base.callsign = text(x)),
        ],
        &[],
    )
});

impl Interpret for SarBeacon {
    fn table() -> &'static PathTable<Self> {
        &SAR_PATHS
    }

    fn apply_identity(&mut self, value: &Value) -> bool {
        identity_name_mmsi(&mut self.base, value)
    }
}

// ---- Aircraft ----

static AIRCRAFT_PATHS: Lazy<PathTable<Aircraft>> = Lazy::new(|| {
    PathTable::<Aircraft>::new(
        &[
            ("name", |a, x| a.base.name = text(x)),
            ("mmsi", |a, x| a.base.mmsi = text(x)),
            ("communication.callsignVhf", |a, x| a.base.callsign = text(x)),
            ("navigation.courseOverGroundTrue", |a, x| a.orientation = num(x)),
            ("navigation.speedOverGround", |a, x| a.sog = num(x)),
        ],
        &[],
    )
});

impl Interpret for Aircraft {
    fn table() -> &'static PathTable<Self> {
        &AIRCRAFT_PATHS
    }

    fn apply_identity(&mut self, value: &Value) -> bool {
        identity_name_mmsi(&mut self.base, value)
    }
}

fn identity_name_mmsi(base: &mut TargetBase, value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    if let Some(name) = obj.get("name") {
        base.name = text(name);
    }
    if let Some(mmsi) = obj.get("mmsi") {
        base.mmsi = text(mmsi);
    }
    true
}
