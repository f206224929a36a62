//! Entity Records
//!
//! Typed in-memory records for everything the stream can describe: the self
//! vessel, AIS vessels, aids-to-navigation, SAR beacons and aircraft.
//!
//! All records share [`TargetBase`] (identity, position, timestamps,
//! unmapped properties, track buffer). Variant-specific fields live on the
//! concrete record and are flattened into the same JSON object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geo::Position;

/// Track history as an ordered list of segments.
///
/// Only the last (active) segment grows. A new segment is opened when
/// continuity breaks, e.g. a target reappears after going stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Track {
    pub segments: Vec<Vec<Position>>,
}

impl Track {
    /// Append a point to the active segment.
    ///
    /// The point is skipped when it equals the last point. The active
    /// segment is trimmed to `max_points`, dropping the oldest points first.
    /// Returns true if the point was added.
    pub fn append(&mut self, point: Position, max_points: usize) -> bool {
        if self.last_point() == Some(point) {
            return false;
        }
        if self.segments.is_empty() {
            self.segments.push(Vec::new());
        }
        let Some(active) = self.segments.last_mut() else {
            return false;
        };
        active.push(point);
        if active.len() > max_points {
            let excess = active.len() - max_points;
            active.drain(..excess);
        }
        true
    }

    /// Open a new, empty active segment (no-op if the active one is empty)
    pub fn start_segment(&mut self) {
        match self.segments.last() {
            Some(active) if active.is_empty() => {}
            _ => self.segments.push(Vec::new()),
        }
    }

    /// Replace the whole history, e.g. with tracks fetched from the server
    pub fn replace(&mut self, segments: Vec<Vec<Position>>) {
        self.segments = segments;
    }

    pub fn last_point(&self) -> Option<Position> {
        self.segments.last().and_then(|s| s.last().copied())
    }

    /// Total number of points across all segments
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }
}

/// Fields shared by every tracked entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetBase {
    /// Context key, e.g. `vessels.urn:mrn:imo:mmsi:123456789`
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mmsi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    /// Last fix as `[lon, lat]`; absent until the first fix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// True once any position has been received
    pub position_received: bool,
    /// Creation time
    pub created: DateTime<Utc>,
    /// Last time any field of this record was written
    pub last_updated: DateTime<Utc>,
    /// Values for paths without a dedicated field, keyed by full path
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub properties: Map<String, Value>,
    pub track: Track,
}

impl TargetBase {
    pub fn new(id: &str, now: DateTime<Utc>) -> Self {
        TargetBase {
            id: id.to_string(),
            name: None,
            mmsi: None,
            callsign: None,
            position: None,
            position_received: false,
            created: now,
            last_updated: now,
            properties: Map::new(),
            track: Track::default(),
        }
    }

    /// Record a write. Never moves `last_updated` backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    /// Milliseconds since the last write, zero if the clock went backwards
    pub fn age_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.last_updated).num_milliseconds().max(0) as u64
    }
}

/// Common access to the shared part of every entity record
pub trait Target {
    fn base(&self) -> &TargetBase;
    fn base_mut(&mut self) -> &mut TargetBase;

    /// Navigation lifecycle state (e.g. `moored`), if the variant has one
    fn state(&self) -> Option<&str> {
        None
    }
}

/// Wind observations, all in SI units as received
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wind {
    /// Apparent wind angle (rad)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awa: Option<f64>,
    /// Apparent wind speed (m/s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws: Option<f64>,
    /// True wind speed through water (m/s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_true: Option<f64>,
    /// True wind speed over ground (m/s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sog: Option<f64>,
    /// True wind direction (rad)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twd: Option<f64>,
    /// Magnetic wind direction (rad)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mwd: Option<f64>,
    /// Value from the preferred true wind speed path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tws: Option<f64>,
    /// Value from the preferred true wind direction path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Autopilot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub mode_list: Vec<String>,
}

/// Raw Course API state as last received.
///
/// Each part holds the object from its `navigation.course.*` path. An empty
/// map means the part is unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseApi {
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub active_route: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub next_point: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub previous_point: Map<String, Value>,
}

impl CourseApi {
    /// The payload handed to the course reconstructor, `None` when cleared
    pub fn payload(&self) -> Option<&CourseApi> {
        if self.active_route.is_empty()
            && self.next_point.is_empty()
            && self.previous_point.is_empty()
        {
            None
        } else {
            Some(self)
        }
    }

    /// Set one part from its path. Object replaces, null clears, anything
    /// deeper sets a single key on the part.
    ///
    /// Returns false for parts this record doesn't hold.
    pub fn set(&mut self, part: &str, key: Option<&str>, value: &Value) -> bool {
        let target = match part {
            "activeRoute" => &mut self.active_route,
            "nextPoint" => &mut self.next_point,
            "previousPoint" => &mut self.previous_point,
            _ => return false,
        };
        match (key, value) {
            (None, Value::Object(obj)) => *target = obj.clone(),
            (None, _) => target.clear(),
            (Some(key), value) => {
                target.insert(key.to_string(), value.clone());
            }
        }
        true
    }
}

/// Self vessel or AIS vessel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vessel {
    #[serde(flatten)]
    pub base: TargetBase,
    pub buddy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Speed over ground (m/s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sog: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cog_true: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cog_magnetic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_true: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_magnetic: Option<f64>,
    /// Value of the preferred heading path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<f64>,
    /// `environment.mode` (day / night)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub wind: Wind,
    pub anchor: Anchor,
    pub autopilot: Autopilot,
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub closest_approach: Map<String, Value>,
    pub course_api: CourseApi,
    /// `navigation.course.calcValues.*` and other course leaves, keyed by
    /// the path below `navigation.course.`
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub course: Map<String, Value>,
    /// `resources.*` deltas received since the last snapshot
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub resource_updates: Vec<Value>,
}

impl Vessel {
    pub fn new(id: &str, now: DateTime<Utc>) -> Self {
        Vessel {
            base: TargetBase::new(id, now),
            buddy: false,
            state: None,
            sog: None,
            cog_true: None,
            cog_magnetic: None,
            heading_true: None,
            heading_magnetic: None,
            orientation: None,
            mode: None,
            wind: Wind::default(),
            anchor: Anchor::default(),
            autopilot: Autopilot::default(),
            closest_approach: Map::new(),
            course_api: CourseApi::default(),
            course: Map::new(),
            resource_updates: Vec::new(),
        }
    }

    /// Course over ground, magnetic or true per preference
    pub fn cog(&self, use_magnetic: bool) -> Option<f64> {
        if use_magnetic {
            self.cog_magnetic
        } else {
            self.cog_true
        }
    }

    /// Heading, magnetic or true per preference
    pub fn heading(&self, use_magnetic: bool) -> Option<f64> {
        if use_magnetic {
            self.heading_magnetic
        } else {
            self.heading_true
        }
    }

    /// Heading with COG as fallback (true values)
    pub fn heading_or_cog(&self) -> Option<f64> {
        self.heading_true.or(self.cog_true)
    }
}

impl Target for Vessel {
    fn base(&self) -> &TargetBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut TargetBase {
        &mut self.base
    }
    fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }
}

/// Type classification of an AtoN or SAR beacon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetType {
    pub id: i64,
    pub name: String,
}

impl TargetType {
    pub fn new(id: i64, name: &str) -> Self {
        TargetType {
            id,
            name: name.to_string(),
        }
    }

    /// Read `{id, name}` leniently
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(TargetType {
            id: obj.get("id").and_then(Value::as_i64).unwrap_or(-1),
            name: obj
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Aid to navigation (includes shore base stations)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtoN {
    #[serde(flatten)]
    pub base: TargetBase,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub aton_type: Option<TargetType>,
}

impl AtoN {
    pub fn new(id: &str, now: DateTime<Utc>) -> Self {
        let aton_type = if id.contains("shore.basestations") {
            Some(TargetType::new(-1, "Basestation"))
        } else {
            None
        };
        AtoN {
            base: TargetBase::new(id, now),
            aton_type,
        }
    }
}

impl Target for AtoN {
    fn base(&self) -> &TargetBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut TargetBase {
        &mut self.base
    }
}

/// Search-and-rescue beacon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SarBeacon {
    #[serde(flatten)]
    pub base: TargetBase,
    #[serde(rename = "type")]
    pub sar_type: TargetType,
}

impl SarBeacon {
    pub fn new(id: &str, now: DateTime<Utc>) -> Self {
        SarBeacon {
            base: TargetBase::new(id, now),
            sar_type: TargetType::new(-1, "SaR Beacon"),
        }
    }
}

impl Target for SarBeacon {
    fn base(&self) -> &TargetBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut TargetBase {
        &mut self.base
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aircraft {
    #[serde(flatten)]
    pub base: TargetBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sog: Option<f64>,
    /// Course over ground true (rad)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<f64>,
}

impl Aircraft {
    pub fn new(id: &str, now: DateTime<Utc>) -> Self {
        Aircraft {
            base: TargetBase::new(id, now),
            sog: None,
            orientation: None,
        }
    }
}

impl Target for Aircraft {
    fn base(&self) -> &TargetBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut TargetBase {
        &mut self.base
    }
}
