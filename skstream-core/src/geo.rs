//! Geographic helpers
//!
//! Positions are `[longitude, latitude]` in degrees, the same order Signal K
//! resources and GeoJSON use. Extents are `[min_lon, min_lat, max_lon, max_lat]`.

use serde_json::Value;

/// `[longitude, latitude]` in degrees
pub type Position = [f64; 2];

/// `[min_longitude, min_latitude, max_longitude, max_latitude]` in degrees
pub type Extent = [f64; 4];

/// Mean earth radius in meters
pub const EARTH_RADIUS: f64 = 6_371_008.8;

/// Meters per degree of latitude (approximately constant)
pub const METERS_PER_DEGREE_LATITUDE: f64 = 111_120.0;

/// Extract a position from a Signal K position object.
///
/// Returns `None` when the value is null, not an object, or either
/// coordinate is missing or not a number.
pub fn position_from_value(value: &Value) -> Option<Position> {
    let lon = value.get("longitude")?.as_f64()?;
    let lat = value.get("latitude")?.as_f64()?;
    Some([lon, lat])
}

/// Extract a position from a `[lon, lat, ...]` coordinate array.
pub fn position_from_array(value: &Value) -> Option<Position> {
    let arr = value.as_array()?;
    let lon = arr.first()?.as_f64()?;
    let lat = arr.get(1)?.as_f64()?;
    Some([lon, lat])
}

/// Bring a position into range: longitude wrapped to [-180, 180],
/// latitude clamped to [-90, 90].
pub fn normalise_coords(position: Position) -> Position {
    let mut lon = position[0];
    if !(-180.0..=180.0).contains(&lon) {
        lon = (lon + 180.0).rem_euclid(360.0) - 180.0;
    }
    [lon, position[1].clamp(-90.0, 90.0)]
}

/// Great-circle destination from `origin` along `bearing` (degrees) for
/// `distance` meters.
///
/// The returned longitude is not wrapped, so points east of the
/// antimeridian come back as e.g. 181.2 instead of -178.8.
pub fn destination(origin: Position, bearing: f64, distance: f64) -> Position {
    let delta = distance / EARTH_RADIUS;
    let theta = bearing.to_radians();
    let lat1 = origin[1].to_radians();
    let lon1 = origin[0].to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    [lon2.to_degrees(), lat2.to_degrees().clamp(-90.0, 90.0)]
}

/// Bounding extent of a circle of `radius` meters around `center`.
///
/// Longitudes are left unwrapped ("mapified") so an extent that crosses the
/// antimeridian stays a single contiguous box, e.g. `[179.5, .., 180.5, ..]`.
pub fn calc_mapified_extent(center: Position, radius: f64) -> Extent {
    let north = destination(center, 0.0, radius);
    let east = destination(center, 90.0, radius);
    let south = destination(center, 180.0, radius);
    let west = destination(center, 270.0, radius);
    [west[0], south[1], east[0], north[1]]
}

/// Check whether a position lies within an extent.
///
/// Handles mapified extents by also testing the point shifted a full
/// revolution east and west.
pub fn in_bounds(position: Position, extent: Extent) -> bool {
    let [min_lon, min_lat, max_lon, max_lat] = extent;
    if position[1] < min_lat || position[1] > max_lat {
        return false;
    }
    [position[0], position[0] + 360.0, position[0] - 360.0]
        .iter()
        .any(|lon| *lon >= min_lon && *lon <= max_lon)
}
