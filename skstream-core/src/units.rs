//! Unit conversions and display unit preferences

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub const MS_TO_KN: f64 = 3600.0 / 1852.0;
pub const KM_TO_NM: f64 = 1000.0 / 1852.0;

/// Meters per second to knots
pub fn ms_to_knots(value: f64) -> f64 {
    value * MS_TO_KN
}

/// Kilometers to nautical miles
pub fn km_to_nautical_miles(value: f64) -> f64 {
    value * KM_TO_NM
}

/// Convert a wind angle relative to the bow into a direction, using the
/// vessel heading. All values in radians; result in [0, 2π).
pub fn angle_to_direction(angle: f64, heading: f64) -> f64 {
    (angle + heading).rem_euclid(2.0 * PI)
}

/// Distance display unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum DistanceUnit {
    /// Kilometers
    #[serde(rename = "m")]
    Metric,
    /// Nautical miles
    #[default]
    #[serde(rename = "nm")]
    Nautical,
}

impl From<String> for DistanceUnit {
    fn from(s: String) -> Self {
        if s == "m" {
            DistanceUnit::Metric
        } else {
            DistanceUnit::Nautical
        }
    }
}

impl DistanceUnit {
    /// Convert a distance in meters into this display unit
    pub fn from_meters(&self, meters: f64) -> f64 {
        match self {
            DistanceUnit::Metric => meters / 1000.0,
            DistanceUnit::Nautical => km_to_nautical_miles(meters / 1000.0),
        }
    }
}

/// Speed display unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum SpeedUnit {
    #[default]
    #[serde(rename = "kn")]
    Knots,
    #[serde(rename = "msec")]
    MetersPerSecond,
}

impl From<String> for SpeedUnit {
    fn from(s: String) -> Self {
        if s == "kn" {
            SpeedUnit::Knots
        } else {
            SpeedUnit::MetersPerSecond
        }
    }
}

impl SpeedUnit {
    /// Convert a speed in m/s into this display unit
    pub fn from_ms(&self, ms: f64) -> f64 {
        match self {
            SpeedUnit::Knots => ms_to_knots(ms),
            SpeedUnit::MetersPerSecond => ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_units() {
        assert!((DistanceUnit::Metric.from_meters(1852.0) - 1.852).abs() < 1e-9);
        assert!((DistanceUnit::Nautical.from_meters(1852.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_units() {
        assert!((SpeedUnit::Knots.from_ms(1852.0 / 3600.0) - 1.0).abs() < 1e-9);
        assert_eq!(SpeedUnit::MetersPerSecond.from_ms(3.0), 3.0);
    }

    #[test]
    fn test_unit_strings() {
        let d: DistanceUnit = serde_json::from_str("\"m\"").unwrap();
        assert_eq!(d, DistanceUnit::Metric);
        let d: DistanceUnit = serde_json::from_str("\"ft\"").unwrap();
        assert_eq!(d, DistanceUnit::Nautical);
        let s: SpeedUnit = serde_json::from_str("\"kmh\"").unwrap();
        assert_eq!(s, SpeedUnit::MetersPerSecond);
    }

    #[test]
    fn test_angle_to_direction_wraps() {
        let d = angle_to_direction(PI, 1.5 * PI);
        assert!((d - 0.5 * PI).abs() < 1e-9);
        let d = angle_to_direction(-0.5 * PI, 0.0);
        assert!((d - 1.5 * PI).abs() < 1e-9);
    }
}
