//! Course / Navigation Reconstruction
//!
//! Folds the self vessel's Course API state and calculated course values
//! into a single [`NavData`] record in display units.
//!
//! Two inputs drive it:
//! - the Course API parts (`activeRoute`, `nextPoint`, `previousPoint`),
//!   re-evaluated as a whole whenever one of them changes
//! - scalar calculated values (`crossTrackError`, `distance`, bearings,
//!   `velocityMadeGood`, `timeToGo`, `estimatedTimeOfArrival`)

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::CourseApi;
use crate::geo::{self, Position};
use crate::units::{DistanceUnit, SpeedUnit};

/// Bearing reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BearingType {
    #[default]
    T,
    M,
}

/// The bearing to display, true or magnetic per preference
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PreferredBearing {
    pub value: Option<f64>,
    #[serde(rename = "type")]
    pub kind: BearingType,
}

/// Derived navigation data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavData {
    /// Cross track error (km or NM)
    pub xte: Option<f64>,
    /// Distance to go (km or NM)
    pub dtg: Option<f64>,
    /// Bearing to next point in degrees
    pub bearing: PreferredBearing,
    pub bearing_true: Option<f64>,
    pub bearing_magnetic: Option<f64>,
    /// Velocity made good (knots or m/s)
    pub vmg: Option<f64>,
    /// Time to go in minutes
    pub ttg: Option<f64>,
    pub eta: Option<DateTime<Utc>>,
    /// Next point `[lon, lat]`
    pub position: Option<Position>,
    /// Previous point `[lon, lat]`
    pub start_position: Option<Position>,
    pub arrival_circle: Option<f64>,
    pub active_waypoint: Option<String>,
    pub active_route: Option<String>,
    pub point_index: i64,
    pub point_total: i64,
    pub point_names: Vec<String>,
    pub active_route_reversed: bool,
    pub active_route_circular: bool,
}

impl Default for NavData {
    fn default() -> Self {
        NavData {
            xte: None,
            dtg: None,
            bearing: PreferredBearing::default(),
            bearing_true: None,
            bearing_magnetic: None,
            vmg: None,
            ttg: None,
            eta: None,
            position: None,
            start_position: None,
            arrival_circle: None,
            active_waypoint: None,
            active_route: None,
            point_index: -1,
            point_total: 0,
            point_names: Vec::new(),
            active_route_reversed: false,
            active_route_circular: false,
        }
    }
}

/// A route resource as supplied by the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    #[serde(default)]
    pub coordinates: Vec<Position>,
    #[serde(default)]
    pub point_names: Vec<String>,
}

impl Route {
    /// First and last coordinates are the same point
    pub fn is_circular(&self) -> bool {
        match (self.coordinates.first(), self.coordinates.last()) {
            (Some(first), Some(last)) => self.coordinates.len() > 1 && first == last,
            _ => false,
        }
    }
}

/// Source of route resources by id
pub trait RouteLookup {
    fn route(&self, id: &str) -> Option<&Route>;
}

impl RouteLookup for HashMap<String, Route> {
    fn route(&self, id: &str) -> Option<&Route> {
        self.get(id)
    }
}

/// Display preferences for derived values
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NavPreferences {
    pub distance: DistanceUnit,
    pub speed: SpeedUnit,
    pub use_magnetic: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CourseReconstructor {
    nav: NavData,
    prefs: NavPreferences,
}

impl CourseReconstructor {
    pub fn new(prefs: NavPreferences) -> Self {
        CourseReconstructor {
            nav: NavData::default(),
            prefs,
        }
    }

    pub fn nav_data(&self) -> &NavData {
        &self.nav
    }

    /// Change display preferences. Already converted values are kept; the
    /// preferred bearing is re-selected immediately.
    pub fn set_preferences(&mut self, prefs: NavPreferences) {
        self.prefs = prefs;
        self.select_bearing();
    }

    /// Re-evaluate the Course API state. `None` clears all route fields.
    pub fn on_course_api_update(&mut self, payload: Option<&CourseApi>, routes: &impl RouteLookup) {
        let Some(api) = payload else {
            self.clear_route();
            return;
        };

        if !api.next_point.is_empty() && !api.previous_point.is_empty() {
            self.nav.arrival_circle = api.next_point.get("arrivalCircle").and_then(Value::as_f64);
            self.nav.start_position = point_position(&api.previous_point);
            self.nav.position = point_position(&api.next_point);
            self.nav.active_waypoint = href_id(&api.next_point);
        }

        if api.active_route.is_empty() {
            return;
        }
        match href_id(&api.active_route) {
            Some(route_id) => {
                let route = &api.active_route;
                self.nav.active_waypoint = None;
                self.nav.point_index = route.get("pointIndex").and_then(Value::as_i64).unwrap_or(-1);
                self.nav.point_total = route.get("pointTotal").and_then(Value::as_i64).unwrap_or(0);
                self.nav.active_route_reversed =
                    route.get("reverse").and_then(Value::as_bool).unwrap_or(false);

                match routes.route(&route_id) {
                    Some(resource) => {
                        self.nav.point_names = resource.point_names.clone();
                        self.nav.active_route_circular = resource.is_circular();
                    }
                    None => {
                        log::debug!("Route {} not available", route_id);
                        self.nav.point_names.clear();
                        self.nav.active_route_circular = false;
                    }
                }
                self.nav.active_route = Some(route_id);
            }
            None => self.nav.active_route = None,
        }
    }

    /// Apply one calculated course value. Returns false for unknown fields.
    pub fn on_scalar_course_field(&mut self, field: &str, value: &Value) -> bool {
        let number = value.as_f64();
        match field {
            "crossTrackError" => {
                self.nav.xte = number.map(|m| self.prefs.distance.from_meters(m));
            }
            "distance" => {
                self.nav.dtg = number.map(|m| self.prefs.distance.from_meters(m));
            }
            "bearingTrue" => {
                self.nav.bearing_true = number.map(f64::to_degrees);
                self.select_bearing();
            }
            "bearingMagnetic" => {
                self.nav.bearing_magnetic = number.map(f64::to_degrees);
                self.select_bearing();
            }
            "velocityMadeGood" => {
                self.nav.vmg = number.map(|ms| self.prefs.speed.from_ms(ms));
            }
            "timeToGo" => {
                self.nav.ttg = number.map(|s| s / 60.0);
            }
            "estimatedTimeOfArrival" => {
                self.nav.eta = value
                    .as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|eta| eta.with_timezone(&Utc));
            }
            _ => return false,
        }
        true
    }

    fn select_bearing(&mut self) {
        if self.prefs.use_magnetic {
            if self.nav.bearing_magnetic.is_some() {
                self.nav.bearing = PreferredBearing {
                    value: self.nav.bearing_magnetic,
                    kind: BearingType::M,
                };
            }
        } else if self.nav.bearing_true.is_some() {
            self.nav.bearing = PreferredBearing {
                value: self.nav.bearing_true,
                kind: BearingType::T,
            };
        }
    }

    fn clear_route(&mut self) {
        self.nav.start_position = None;
        self.nav.position = None;
        self.nav.active_waypoint = None;
        self.nav.active_route = None;
        self.nav.point_index = -1;
        self.nav.point_total = 0;
        self.nav.point_names.clear();
        self.nav.active_route_reversed = false;
    }
}

/// Trailing segment of an `href` such as `/resources/routes/<id>`
fn href_id(part: &Map<String, Value>) -> Option<String> {
    let href = part.get("href")?.as_str()?;
    href.rsplit('/').next().filter(|id| !id.is_empty()).map(str::to_string)
}

fn point_position(part: &Map<String, Value>) -> Option<Position> {
    part.get("position").and_then(geo::position_from_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::f64::consts::PI;

    fn routes() -> HashMap<String, Route> {
        let mut routes = HashMap::new();
        routes.insert(
            "r1".to_string(),
            Route {
                id: "r1".into(),
                coordinates: vec![[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]],
                point_names: vec!["A".into(), "B".into(), "A".into()],
            },
        );
        routes
    }

    fn full_payload() -> CourseApi {
        let mut api = CourseApi::default();
        api.set(
            "activeRoute",
            None,
            &json!({"href": "/resources/routes/r1", "pointIndex": 1, "pointTotal": 3, "reverse": true}),
        );
        api.set(
            "nextPoint",
            None,
            &json!({
                "href": "/resources/waypoints/w2",
                "position": {"longitude": 1.0, "latitude": 1.0},
                "arrivalCircle": 50
            }),
        );
        api.set(
            "previousPoint",
            None,
            &json!({"position": {"longitude": 0.0, "latitude": 0.0}}),
        );
        api
    }

    #[test]
    fn test_full_payload() {
        let mut course = CourseReconstructor::default();
        course.on_course_api_update(Some(&full_payload()), &routes());
        let nav = course.nav_data();

        assert_eq!(nav.start_position, Some([0.0, 0.0]));
        assert_eq!(nav.position, Some([1.0, 1.0]));
        assert_eq!(nav.arrival_circle, Some(50.0));
        assert_eq!(nav.active_route.as_deref(), Some("r1"));
        assert_eq!(nav.active_waypoint, None);
        assert_eq!(nav.point_index, 1);
        assert_eq!(nav.point_total, 3);
        assert_eq!(nav.point_names, vec!["A", "B", "A"]);
        assert!(nav.active_route_reversed);
        assert!(nav.active_route_circular);
    }

    #[test]
    fn test_null_payload_clears_route_fields() {
        let mut course = CourseReconstructor::default();
        course.on_course_api_update(Some(&full_payload()), &routes());
        course.on_scalar_course_field("distance", &json!(1852.0));

        course.on_course_api_update(None, &routes());
        let nav = course.nav_data();
        assert_eq!(nav.start_position, None);
        assert_eq!(nav.position, None);
        assert_eq!(nav.active_waypoint, None);
        assert_eq!(nav.active_route, None);
        assert_eq!(nav.point_index, -1);
        assert_eq!(nav.point_total, 0);
        assert!(nav.point_names.is_empty());
        assert!(!nav.active_route_reversed);
        // Calculated values are not route fields
        assert!(nav.dtg.is_some());
    }

    #[test]
    fn test_points_only_leaves_route_fields() {
        let mut course = CourseReconstructor::default();
        course.on_course_api_update(Some(&full_payload()), &routes());

        let mut api = CourseApi::default();
        api.set(
            "nextPoint",
            None,
            &json!({"href": "/resources/waypoints/w9", "position": {"longitude": 5.0, "latitude": 6.0}}),
        );
        api.set("previousPoint", None, &json!({"position": {"longitude": 4.0, "latitude": 6.0}}));
        course.on_course_api_update(Some(&api), &routes());

        let nav = course.nav_data();
        assert_eq!(nav.position, Some([5.0, 6.0]));
        assert_eq!(nav.active_waypoint.as_deref(), Some("w9"));
        assert_eq!(nav.active_route.as_deref(), Some("r1"));
        assert_eq!(nav.point_index, 1);
        assert_eq!(nav.point_total, 3);
        assert_eq!(nav.point_names.len(), 3);
        assert!(nav.active_route_reversed);
    }

    #[test]
    fn test_next_point_alone_sets_nothing() {
        let mut course = CourseReconstructor::default();
        let mut api = CourseApi::default();
        api.set("nextPoint", None, &json!({"position": {"longitude": 5.0, "latitude": 6.0}}));
        course.on_course_api_update(Some(&api), &routes());
        assert_eq!(course.nav_data(), &NavData::default());
    }

    #[test]
    fn test_unknown_route() {
        let mut course = CourseReconstructor::default();
        let mut api = CourseApi::default();
        api.set("activeRoute", None, &json!({"href": "/resources/routes/zz", "pointIndex": 0, "pointTotal": 2}));
        course.on_course_api_update(Some(&api), &routes());
        let nav = course.nav_data();
        assert_eq!(nav.active_route.as_deref(), Some("zz"));
        assert!(nav.point_names.is_empty());
        assert!(!nav.active_route_circular);
    }

    #[test]
    fn test_scalar_conversions() {
        let mut course = CourseReconstructor::new(NavPreferences {
            distance: DistanceUnit::Metric,
            speed: SpeedUnit::Knots,
            use_magnetic: false,
        });
        course.on_scalar_course_field("crossTrackError", &json!(250.0));
        course.on_scalar_course_field("velocityMadeGood", &json!(1852.0 / 3600.0));
        course.on_scalar_course_field("timeToGo", &json!(600));
        course.on_scalar_course_field("bearingTrue", &json!(PI));
        course.on_scalar_course_field("bearingMagnetic", &json!(PI / 2.0));
        assert!(!course.on_scalar_course_field("targetSpeed", &json!(1)));

        let nav = course.nav_data();
        assert!((nav.xte.unwrap() - 0.25).abs() < 1e-9);
        assert!((nav.vmg.unwrap() - 1.0).abs() < 1e-9);
        assert!((nav.ttg.unwrap() - 10.0).abs() < 1e-9);
        assert!((nav.bearing_true.unwrap() - 180.0).abs() < 1e-9);
        assert_eq!(nav.bearing.kind, BearingType::T);
        assert!((nav.bearing.value.unwrap() - 180.0).abs() < 1e-9);

        course.set_preferences(NavPreferences {
            use_magnetic: true,
            ..NavPreferences::default()
        });
        let nav = course.nav_data();
        assert_eq!(nav.bearing.kind, BearingType::M);
        assert!((nav.bearing.value.unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_nautical_distance() {
        let mut course = CourseReconstructor::default();
        course.on_scalar_course_field("distance", &json!(3704.0));
        assert!((course.nav_data().dtg.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_eta() {
        let mut course = CourseReconstructor::default();
        course.on_scalar_course_field("estimatedTimeOfArrival", &json!("2024-05-01T12:30:00Z"));
        assert_eq!(
            course.nav_data().eta.map(|d| d.to_rfc3339()),
            Some("2024-05-01T12:30:00+00:00".to_string())
        );

        course.on_scalar_course_field("estimatedTimeOfArrival", &json!("tomorrow"));
        assert_eq!(course.nav_data().eta, None);

        course.on_scalar_course_field("estimatedTimeOfArrival", &json!("2024-05-01T12:30:00Z"));
        course.on_scalar_course_field("estimatedTimeOfArrival", &Value::Null);
        assert_eq!(course.nav_data().eta, None);
    }

    #[test]
    fn test_circular_route() {
        let open = Route {
            id: "x".into(),
            coordinates: vec![[0.0, 0.0], [1.0, 0.0]],
            point_names: vec![],
        };
        assert!(!open.is_circular());
        let single = Route {
            id: "y".into(),
            coordinates: vec![[0.0, 0.0]],
            point_names: vec![],
        };
        assert!(!single.is_circular());
    }
}
