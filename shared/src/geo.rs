//! Geo primitives for city-scale distance calculations

use crate::error::{AppError, AppResult, ErrorCode};
use serde::{Deserialize, Serialize};

/// Mean earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate pair
///
/// Distances use the equirectangular approximation, which is accurate to
/// about ±0.5% at 10 km. That is sufficient for city-scale merge-radius
/// and partner-search queries; this type is not suitable for long-haul
/// routing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, -90..=90
    pub lat: f64,
    /// Longitude in degrees, -180..=180
    pub lng: f64,
}

impl GeoPoint {
    /// Create a new point without validating the coordinates
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validate coordinate ranges
    ///
    /// Rejects NaN/infinite values and out-of-range degrees.
    pub fn validate(&self) -> AppResult<()> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(AppError::with_message(
                ErrorCode::InvalidCoordinates,
                "coordinates must be finite",
            ));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(
                AppError::with_message(ErrorCode::InvalidCoordinates, "latitude out of range")
                    .with_detail("lat", self.lat),
            );
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(
                AppError::with_message(ErrorCode::InvalidCoordinates, "longitude out of range")
                    .with_detail("lng", self.lng),
            );
        }
        Ok(())
    }

    /// Distance to another point in kilometers (equirectangular approximation)
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let mean_lat = ((self.lat + other.lat) / 2.0).to_radians();
        let dx = (other.lng - self.lng).to_radians() * mean_lat.cos();
        let dy = (other.lat - self.lat).to_radians();
        EARTH_RADIUS_KM * (dx * dx + dy * dy).sqrt()
    }
}

/// Arithmetic centroid of a set of points
///
/// Returns `None` for an empty slice. Valid at city scale where the
/// flat-earth approximation holds.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lng = points.iter().map(|p| p.lng).sum::<f64>() / n;
    Some(GeoPoint::new(lat, lng))
}
