//! Geographic coordinates and bounding boxes

use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DssError;

/// A validated WGS84 point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CoordinateParts")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct CoordinateParts {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<CoordinateParts> for Coordinate {
    type Error = DssError;

    fn try_from(parts: CoordinateParts) -> Result<Self, Self::Error> {
        Coordinate::new(parts.latitude, parts.longitude)
    }
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range or non-finite values
    pub fn new(latitude: f64, longitude: f64) -> crate::Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(DssError::validation(format!(
                "latitude {latitude} must be within [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(DssError::validation(format!(
                "longitude {longitude} must be within [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Build from literals known to be in range
    pub(crate) const fn new_unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Latitude in decimal degrees
    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in decimal degrees
    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance in kilometers
    #[must_use]
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance(
            HaversineLocation {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            HaversineLocation {
                latitude: other.latitude,
                longitude: other.longitude,
            },
            Units::Kilometers,
        )
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.format_coordinates())
    }
}

/// Axis-aligned latitude/longitude box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl RegionBounds {
    /// Create bounds, requiring min <= max on both axes
    pub fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> crate::Result<Self> {
        let bounds = Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if !(self.min_latitude <= self.max_latitude) {
            return Err(DssError::validation(format!(
                "min latitude {} exceeds max latitude {}",
                self.min_latitude, self.max_latitude
            )));
        }
        if !(self.min_longitude <= self.max_longitude) {
            return Err(DssError::validation(format!(
                "min longitude {} exceeds max longitude {}",
                self.min_longitude, self.max_longitude
            )));
        }
        Ok(())
    }

    /// Inclusive containment test
    #[must_use]
    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&point.latitude())
            && (self.min_longitude..=self.max_longitude).contains(&point.longitude())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(2.05, 45.34).is_ok());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, 180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_coordinate_deserialize_validates() {
        let ok: Coordinate = serde_json::from_str(r#"{"latitude": 9.56, "longitude": 44.06}"#).unwrap();
        assert_eq!(ok.latitude(), 9.56);

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude": 123.0, "longitude": 44.06}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_distance_between_towns() {
        let mogadishu = Coordinate::new(2.0469, 45.3182).unwrap();
        let baidoa = Coordinate::new(3.1133, 43.6492).unwrap();
        let km = mogadishu.distance_km(&baidoa);
        assert!((210.0..230.0).contains(&km), "unexpected distance {km}");
        assert_eq!(mogadishu.distance_km(&mogadishu), 0.0);
    }

    #[test]
    fn test_bounds_contains_inclusive() {
        let bounds = RegionBounds::new(-2.0, 12.0, 40.5, 51.5).unwrap();
        assert!(bounds.contains(&Coordinate::new(2.05, 45.34).unwrap()));
        assert!(bounds.contains(&Coordinate::new(-2.0, 40.5).unwrap()));
        assert!(bounds.contains(&Coordinate::new(12.0, 51.5).unwrap()));
        assert!(!bounds.contains(&Coordinate::new(52.52, 13.40).unwrap()));
    }

    #[test]
    fn test_bounds_reject_inverted_axes() {
        assert!(RegionBounds::new(12.0, -2.0, 40.5, 51.5).is_err());
        assert!(RegionBounds::new(-2.0, 12.0, 51.5, 40.5).is_err());
    }
}
