//! Common types used throughout FieldMark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius in meters, used for great-circle distance.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Identifier for the employee reporting attendance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeCode(String);

impl EmployeeCode {
    /// Create a new EmployeeCode from a string.
    ///
    /// # Errors
    /// - Returns error if the code is empty
    pub fn new(code: impl Into<String>) -> crate::Result<Self> {
        let code = code.into();
        if code.is_empty() {
            return Err(crate::Error::InvalidInput(
                "EmployeeCode cannot be empty".to_string(),
            ));
        }
        Ok(Self(code))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a configured geofence region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(String);

impl RegionId {
    /// Create a new RegionId from a string.
    ///
    /// # Errors
    /// - Returns error if the id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "RegionId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A geographic coordinate (WGS84 latitude/longitude in degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a validated coordinate.
    ///
    /// # Errors
    /// - Latitude outside [-90, 90] or longitude outside [-180, 180]
    pub fn new(latitude: f64, longitude: f64) -> crate::Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !latitude.is_finite() {
            return Err(crate::Error::InvalidInput(format!(
                "Latitude out of range: {}",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) || !longitude.is_finite() {
            return Err(crate::Error::InvalidInput(format!(
                "Longitude out of range: {}",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Great-circle distance to another coordinate in meters (haversine).
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// A device location fix as delivered by the platform location service.
///
/// Created fresh each cycle and never mutated; discarded after the cycle
/// unless persisted into the sync state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationFix {
    /// The reported coordinate.
    pub coordinate: Coordinate,
    /// Estimated horizontal accuracy in meters (68% confidence radius).
    pub accuracy_m: f64,
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    /// Create a new fix stamped with the given time.
    pub fn new(coordinate: Coordinate, accuracy_m: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            accuracy_m,
            timestamp,
        }
    }

    /// Age of the fix relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}
