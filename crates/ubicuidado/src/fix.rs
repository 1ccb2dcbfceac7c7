//! Core position types.
//!
//! A [`PositionFix`] is a single reported device position. Fixes are never
//! mutated: every new report supersedes the previous one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude, positive north.
    pub latitude: f64,
    /// Longitude, positive east.
    pub longitude: f64,
}

impl Coordinates {
    /// Create a coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and within WGS84 bounds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A single position report from a geolocation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    /// Latitude in decimal degrees.
    pub latitude: f64,

    /// Longitude in decimal degrees.
    pub longitude: f64,

    /// Estimated horizontal accuracy radius in meters.
    pub accuracy_meters: f64,

    /// When the provider observed this position.
    pub observed_at: DateTime<Utc>,
}

impl PositionFix {
    /// Create a fix observed at the given time.
    #[must_use]
    pub fn new(
        latitude: f64,
        longitude: f64,
        accuracy_meters: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            observed_at,
        }
    }

    /// Create a fix observed now.
    #[must_use]
    pub fn now(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self::new(latitude, longitude, accuracy_meters, Utc::now())
    }

    /// The position of this fix.
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_display() {
        let c = Coordinates::new(19.4326, -99.1332);
        assert_eq!(c.to_string(), "19.432600, -99.133200");
    }

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(19.4326, -99.1332).is_valid());
        assert!(Coordinates::new(-90.0, 180.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -181.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_fix_coordinates() {
        let fix = PositionFix::now(10.0, 20.0, 5.0);
        assert_eq!(fix.coordinates(), Coordinates::new(10.0, 20.0));
    }

    #[test]
    fn test_fix_serialization() {
        let fix = PositionFix::now(19.4326, -99.1332, 12.5);
        let json = serde_json::to_string(&fix).unwrap();
        let back: PositionFix = serde_json::from_str(&json).unwrap();
        assert_eq!(fix, back);
    }
}
