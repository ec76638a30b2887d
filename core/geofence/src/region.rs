//! Geofence region definition.

use serde::{Deserialize, Serialize};

use fieldmark_common::{Coordinate, Error, RegionId, Result};

/// A circular geofence region.
///
/// Regions are owned by configuration and immutable once loaded for a cycle;
/// the engine only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceRegion {
    /// Unique region identifier.
    pub id: RegionId,
    /// Human-readable name for logs and UI display.
    pub name: String,
    /// Center coordinate.
    pub center: Coordinate,
    /// Radius in meters.
    pub radius_m: f64,
}

impl GeofenceRegion {
    /// Create a validated region.
    ///
    /// # Errors
    /// - Radius is not a positive finite number
    pub fn new(
        id: RegionId,
        name: impl Into<String>,
        center: Coordinate,
        radius_m: f64,
    ) -> Result<Self> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Region radius must be positive, got {}",
                radius_m
            )));
        }
        Ok(Self {
            id,
            name: name.into(),
            center,
            radius_m,
        })
    }

    /// Distance in meters from the region center to a coordinate.
    pub fn distance_to(&self, coordinate: &Coordinate) -> f64 {
        self.center.distance_meters(coordinate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(radius_m: f64) -> Result<GeofenceRegion> {
        GeofenceRegion::new(
            RegionId::new("hq")?,
            "Head Office",
            Coordinate::new(13.7563, 100.5018)?,
            radius_m,
        )
    }

    #[test]
    fn test_region_creation() {
        let r = region(100.0).unwrap();
        assert_eq!(r.id.as_str(), "hq");
        assert_eq!(r.radius_m, 100.0);
    }

    #[test]
    fn test_zero_radius_fails() {
        assert!(region(0.0).is_err());
        assert!(region(-5.0).is_err());
        assert!(region(f64::NAN).is_err());
    }

    #[test]
    fn test_distance_to_center_is_zero() {
        let r = region(100.0).unwrap();
        assert!(r.distance_to(&r.center) < 1e-6);
    }

    #[test]
    fn test_region_serialization() {
        let r = region(100.0).unwrap();
        let json = serde_json::to_string(&r).unwrap();
        let restored: GeofenceRegion = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, r.id);
        assert_eq!(restored.radius_m, r.radius_m);
    }
}
