//! Geodesic helpers
//!
//! Initial great-circle bearing between two coordinates, plus the heading
//! arithmetic used when aiming a street-level camera at a storefront.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic coordinate in signed decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude (positive north)
    pub lat: f64,
    /// Longitude (positive east)
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Format as the `lat,lng` pair used in query strings
    pub fn to_query_value(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lng)
    }
}

/// Initial bearing in degrees [0, 360) from `origin` to `target`
///
/// Standard spherical formula:
/// `θ = atan2(sin Δλ · cos φ2, cos φ1 · sin φ2 − sin φ1 · cos φ2 · cos Δλ)`
pub fn initial_bearing(origin: Coordinate, target: Coordinate) -> f64 {
    let phi1 = origin.lat.to_radians();
    let phi2 = target.lat.to_radians();
    let delta_lambda = (target.lng - origin.lng).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    normalize_degrees(y.atan2(x).to_degrees())
}

/// `(base + offset) mod 360`, normalized to [0, 360)
pub fn offset_bearing(base: f64, offset: f64) -> f64 {
    normalize_degrees(base + offset)
}

/// Round a bearing to the integer heading expected by imagery APIs
///
/// 359.6 rounds to 360, which wraps to 0.
pub fn heading_degrees(bearing: f64) -> u16 {
    (bearing.round() as i64).rem_euclid(360) as u16
}

fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}
