//! Great-circle distance and the bounding-box pre-filter used by proximity
//! queries.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Flat approximation of the length of one degree, used only to size the
/// bounding box that narrows a proximity scan before exact filtering.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// A WGS84 point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Location {
  /// Build a location, rejecting coordinates outside `[-90, 90]` ×
  /// `[-180, 180]` (and NaN).
  pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
    if !(-90.0..=90.0).contains(&latitude) {
      return Err(Error::BadRequest(format!(
        "latitude must be within [-90, 90], got {latitude}"
      )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
      return Err(Error::BadRequest(format!(
        "longitude must be within [-180, 180], got {longitude}"
      )));
    }
    Ok(Self { latitude, longitude })
  }

  /// Haversine distance to `other`, in meters.
  pub fn distance_to(&self, other: &Location) -> f64 {
    haversine_meters(self.latitude, self.longitude, other.latitude, other.longitude)
  }
}

/// Haversine distance between two lat/lng points in meters.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
  let dlat = (lat2 - lat1).to_radians();
  let dlng = (lng2 - lng1).to_radians();

  let a = (dlat / 2.0).sin().powi(2)
    + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);

  let c = 2.0 * a.sqrt().min(1.0).asin();
  EARTH_RADIUS_METERS * c
}

/// Inclusive latitude/longitude window that contains every point within a
/// radius of a center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub min_latitude:  f64,
  pub max_latitude:  f64,
  pub min_longitude: f64,
  pub max_longitude: f64,
}

impl BoundingBox {
  /// The box around `center` for `radius_meters`.
  ///
  /// The longitude span is widened by `1 / cos(latitude)` so the box stays a
  /// superset of the circle away from the equator; near the poles it covers
  /// the full longitude range.
  pub fn around(center: &Location, radius_meters: f64) -> Self {
    let lat_delta = radius_meters / METERS_PER_DEGREE;
    let cos_lat = center.latitude.to_radians().cos();
    let lng_delta = if cos_lat > 1e-6 {
      (radius_meters / (METERS_PER_DEGREE * cos_lat)).min(360.0)
    } else {
      360.0
    };

    Self {
      min_latitude:  center.latitude - lat_delta,
      max_latitude:  center.latitude + lat_delta,
      min_longitude: center.longitude - lng_delta,
      max_longitude: center.longitude + lng_delta,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn inside(bbox: &BoundingBox, point: &Location) -> bool {
    (bbox.min_latitude..=bbox.max_latitude).contains(&point.latitude)
      && (bbox.min_longitude..=bbox.max_longitude).contains(&point.longitude)
  }

  #[test]
  fn paris_to_lyon_is_about_392_km() {
    let paris = Location::new(48.8566, 2.3522).unwrap();
    let lyon = Location::new(45.7640, 4.8357).unwrap();
    let d = paris.distance_to(&lyon);
    assert!((d - 392_000.0).abs() < 5_000.0, "expected ~392km, got {d}m");
  }

  #[test]
  fn distance_to_self_is_zero() {
    let p = Location::new(44.97, -93.26).unwrap();
    assert!(p.distance_to(&p) < 1e-6);
  }

  #[test]
  fn rejects_out_of_range_coordinates() {
    assert!(matches!(Location::new(90.5, 0.0), Err(Error::BadRequest(_))));
    assert!(matches!(Location::new(0.0, -180.1), Err(Error::BadRequest(_))));
    assert!(matches!(Location::new(f64::NAN, 0.0), Err(Error::BadRequest(_))));
    assert!(Location::new(-90.0, 180.0).is_ok());
  }

  #[test]
  fn bounding_box_contains_points_on_the_circle() {
    let center = Location::new(60.0, 10.0).unwrap();
    let radius = 100.0;
    let bbox = BoundingBox::around(&center, radius);

    // ~99 m due east; at 60°N a degree of longitude is only ~55.5 km.
    let east = Location::new(60.0, 10.0 + 99.0 / 55_500.0).unwrap();
    assert!(center.distance_to(&east) <= radius);
    assert!(inside(&bbox, &east));

    let north = Location::new(60.0 + 99.0 / 111_000.0, 10.0).unwrap();
    assert!(inside(&bbox, &north));

    let far = Location::new(60.01, 10.0).unwrap();
    assert!(!inside(&bbox, &far));
  }
}
