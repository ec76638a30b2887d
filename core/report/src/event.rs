//! Attendance event and idempotency key derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldmark_common::{Coordinate, EmployeeCode, LocationFix, RegionId};

/// A single attendance event, created when a region transitions to Inside
/// (or is first seen Inside for a new key bucket).
///
/// Immutable once created; submitted at-most-effectively-once, keyed by
/// `idempotency_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// The employee reporting attendance.
    pub employee_code: EmployeeCode,
    /// The region the device entered.
    pub region_id: RegionId,
    /// Entry timestamp (the fix timestamp).
    pub timestamp: DateTime<Utc>,
    /// Coordinate of the fix that triggered the event.
    pub coordinate: Coordinate,
    /// Deterministic key the backend deduplicates on.
    pub idempotency_key: String,
}

impl AttendanceEvent {
    /// Build an event from the fix that detected the entry.
    pub fn from_fix(employee_code: EmployeeCode, region_id: RegionId, fix: &LocationFix) -> Self {
        let idempotency_key = idempotency_key(&employee_code, &region_id, fix.timestamp);
        Self {
            employee_code,
            region_id,
            timestamp: fix.timestamp,
            coordinate: fix.coordinate,
            idempotency_key,
        }
    }
}

/// Derive the idempotency key for an employee/region/timestamp.
///
/// The key buckets time by UTC calendar day, so re-entering the same region
/// on the same day never produces a second attendance row, while the first
/// fix of a new day does.
pub fn idempotency_key(
    employee_code: &EmployeeCode,
    region_id: &RegionId,
    timestamp: DateTime<Utc>,
) -> String {
    format!(
        "{}:{}:{}",
        employee_code,
        region_id,
        timestamp.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn employee() -> EmployeeCode {
        EmployeeCode::new("EMP-042").unwrap()
    }

    fn region() -> RegionId {
        RegionId::new("hq").unwrap()
    }

    #[test]
    fn test_key_is_deterministic() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 24, 9, 15, 0).unwrap();
        let a = idempotency_key(&employee(), &region(), ts);
        let b = idempotency_key(&employee(), &region(), ts);
        assert_eq!(a, b);
        assert_eq!(a, "EMP-042:hq:2026-08-24");
    }

    #[test]
    fn test_same_day_same_key() {
        let morning = Utc.with_ymd_and_hms(2026, 8, 24, 8, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2026, 8, 24, 19, 30, 0).unwrap();
        assert_eq!(
            idempotency_key(&employee(), &region(), morning),
            idempotency_key(&employee(), &region(), evening)
        );
    }

    #[test]
    fn test_new_day_new_key() {
        let today = Utc.with_ymd_and_hms(2026, 8, 24, 23, 59, 0).unwrap();
        let tomorrow = Utc.with_ymd_and_hms(2026, 8, 25, 0, 1, 0).unwrap();
        assert_ne!(
            idempotency_key(&employee(), &region(), today),
            idempotency_key(&employee(), &region(), tomorrow)
        );
    }

    #[test]
    fn test_distinct_regions_distinct_keys() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 24, 9, 0, 0).unwrap();
        let other = RegionId::new("branch").unwrap();
        assert_ne!(
            idempotency_key(&employee(), &region(), ts),
            idempotency_key(&employee(), &other, ts)
        );
    }

    #[test]
    fn test_event_from_fix_carries_key() {
        let fix = LocationFix::new(
            Coordinate::new(13.7563, 100.5018).unwrap(),
            8.0,
            Utc.with_ymd_and_hms(2026, 8, 24, 9, 0, 0).unwrap(),
        );
        let event = AttendanceEvent::from_fix(employee(), region(), &fix);
        assert_eq!(event.idempotency_key, "EMP-042:hq:2026-08-24");
        assert_eq!(event.timestamp, fix.timestamp);
    }
}
