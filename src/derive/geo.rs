//! Great-circle distance and the check-in geofence.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two (lat, lon) points in degrees.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
  let phi1 = lat1.to_radians();
  let phi2 = lat2.to_radians();
  let d_phi = (lat2 - lat1).to_radians();
  let d_lambda = (lon2 - lon1).to_radians();

  let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
  let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());

  EARTH_RADIUS_M * c
}

/// Outcome of a geofence check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceCheck {
  pub distance_m: f64,
  pub radius_m: f64,
}

impl GeofenceCheck {
  pub fn within(&self) -> bool {
    self.distance_m <= self.radius_m
  }
}

/// Distance from the worker's position to the site, against `radius_m`.
pub fn check_geofence(worker: (f64, f64), site: (f64, f64), radius_m: f64) -> GeofenceCheck {
  GeofenceCheck {
    distance_m: distance_m(worker.0, worker.1, site.0, site.1),
    radius_m,
  }
}
