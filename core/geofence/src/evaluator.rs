//! Hysteresis-aware geofence evaluation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use fieldmark_common::{LocationFix, RegionId};

use crate::region::GeofenceRegion;

/// Inside/outside classification for one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionStatus {
    /// No usable classification (no prior fix, or accuracy above ceiling).
    Unknown,
    /// The device is inside the region.
    Inside,
    /// The device is outside the region.
    Outside,
}

/// Evaluation result for one region, carrying the fix it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceStatus {
    /// The region this status applies to.
    pub region_id: RegionId,
    /// The classification.
    pub status: RegionStatus,
    /// Distance from the fix to the region center, in meters.
    pub distance_m: f64,
    /// The fix used to derive this status.
    pub fix: LocationFix,
}

/// Configuration for geofence evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Hysteresis margin in meters: exit requires distance > radius + margin.
    pub hysteresis_m: f64,
    /// Fixes with accuracy above this ceiling classify as Unknown.
    pub accuracy_ceiling_m: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            hysteresis_m: 10.0,
            accuracy_ceiling_m: 100.0,
        }
    }
}

/// Classifies fixes against configured regions.
///
/// Entry requires `distance <= radius`; exit requires
/// `distance > radius + hysteresis`. Within the band the previous status is
/// retained, so GPS noise near the boundary cannot flap the status.
#[derive(Debug, Clone)]
pub struct GeofenceEvaluator {
    config: EvaluatorConfig,
}

impl GeofenceEvaluator {
    /// Create a new evaluator.
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Evaluate a fix against all regions.
    ///
    /// `previous` holds the last known status per region; regions without an
    /// entry are treated as `Unknown`.
    pub fn evaluate(
        &self,
        fix: &LocationFix,
        regions: &[GeofenceRegion],
        previous: &HashMap<RegionId, RegionStatus>,
    ) -> Vec<GeofenceStatus> {
        regions
            .iter()
            .map(|region| {
                let prior = previous
                    .get(&region.id)
                    .copied()
                    .unwrap_or(RegionStatus::Unknown);
                self.evaluate_region(fix, region, prior)
            })
            .collect()
    }

    /// Evaluate a fix against a single region.
    pub fn evaluate_region(
        &self,
        fix: &LocationFix,
        region: &GeofenceRegion,
        previous: RegionStatus,
    ) -> GeofenceStatus {
        let distance_m = region.distance_to(&fix.coordinate);

        let status = if fix.accuracy_m > self.config.accuracy_ceiling_m {
            // Too imprecise to classify; the engine must skip this region
            // for the cycle rather than treat it as outside.
            debug!(
                region = %region.id,
                accuracy_m = fix.accuracy_m,
                ceiling_m = self.config.accuracy_ceiling_m,
                "Fix accuracy above ceiling, status unknown"
            );
            RegionStatus::Unknown
        } else {
            self.classify(distance_m, region.radius_m, previous)
        };

        debug!(
            region = %region.id,
            distance_m,
            radius_m = region.radius_m,
            ?previous,
            ?status,
            "Evaluated region"
        );

        GeofenceStatus {
            region_id: region.id.clone(),
            status,
            distance_m,
            fix: fix.clone(),
        }
    }

    fn classify(&self, distance_m: f64, radius_m: f64, previous: RegionStatus) -> RegionStatus {
        if distance_m <= radius_m {
            RegionStatus::Inside
        } else if distance_m > radius_m + self.config.hysteresis_m {
            RegionStatus::Outside
        } else {
            // Inside the hysteresis band: retain the previous status.
            previous
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fieldmark_common::Coordinate;
    use proptest::prelude::*;

    const METERS_PER_DEG_LAT: f64 = 111_195.0;

    fn region(radius_m: f64) -> GeofenceRegion {
        GeofenceRegion::new(
            RegionId::new("hq").unwrap(),
            "Head Office",
            Coordinate::new(13.7563, 100.5018).unwrap(),
            radius_m,
        )
        .unwrap()
    }

    /// Build a fix roughly `offset_m` meters due north of the region center.
    fn fix_at(region: &GeofenceRegion, offset_m: f64, accuracy_m: f64) -> LocationFix {
        let coordinate = Coordinate::new(
            region.center.latitude + offset_m / METERS_PER_DEG_LAT,
            region.center.longitude,
        )
        .unwrap();
        LocationFix::new(coordinate, accuracy_m, Utc::now())
    }

    fn evaluator() -> GeofenceEvaluator {
        GeofenceEvaluator::new(EvaluatorConfig {
            hysteresis_m: 10.0,
            accuracy_ceiling_m: 100.0,
        })
    }

    #[test]
    fn test_fix_at_center_enters_from_outside() {
        let r = region(100.0);
        let fix = LocationFix::new(r.center, 5.0, Utc::now());
        let status = evaluator().evaluate_region(&fix, &r, RegionStatus::Outside);
        assert_eq!(status.status, RegionStatus::Inside);
        assert!(status.distance_m < 1.0);
    }

    #[test]
    fn test_band_fix_retains_inside() {
        // 105m from center, radius 100, hysteresis 10: within the band,
        // previous Inside is retained.
        let r = region(100.0);
        let fix = fix_at(&r, 105.0, 5.0);
        let status = evaluator().evaluate_region(&fix, &r, RegionStatus::Inside);
        assert_eq!(status.status, RegionStatus::Inside);
    }

    #[test]
    fn test_band_fix_retains_outside() {
        let r = region(100.0);
        let fix = fix_at(&r, 105.0, 5.0);
        let status = evaluator().evaluate_region(&fix, &r, RegionStatus::Outside);
        assert_eq!(status.status, RegionStatus::Outside);
    }

    #[test]
    fn test_exit_beyond_hysteresis() {
        let r = region(100.0);
        let fix = fix_at(&r, 150.0, 5.0);
        let status = evaluator().evaluate_region(&fix, &r, RegionStatus::Inside);
        assert_eq!(status.status, RegionStatus::Outside);
    }

    #[test]
    fn test_low_accuracy_yields_unknown() {
        let r = region(100.0);
        let fix = LocationFix::new(r.center, 250.0, Utc::now());
        let status = evaluator().evaluate_region(&fix, &r, RegionStatus::Inside);
        assert_eq!(status.status, RegionStatus::Unknown);
    }

    #[test]
    fn test_unknown_previous_in_band_stays_unknown() {
        let r = region(100.0);
        let fix = fix_at(&r, 105.0, 5.0);
        let status = evaluator().evaluate_region(&fix, &r, RegionStatus::Unknown);
        assert_eq!(status.status, RegionStatus::Unknown);
    }

    #[test]
    fn test_evaluate_multiple_regions() {
        let near = region(100.0);
        let far = GeofenceRegion::new(
            RegionId::new("branch").unwrap(),
            "Branch Office",
            Coordinate::new(14.7563, 100.5018).unwrap(),
            100.0,
        )
        .unwrap();

        let fix = LocationFix::new(near.center, 5.0, Utc::now());
        let statuses = evaluator().evaluate(&fix, &[near, far], &HashMap::new());

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].status, RegionStatus::Inside);
        assert_eq!(statuses[1].status, RegionStatus::Outside);
    }

    proptest! {
        #[test]
        fn prop_no_flapping(
            radius_m in 50.0f64..500.0,
            hysteresis_m in 1.0f64..25.0,
            offset_m in 0.0f64..1000.0,
            prev_inside in proptest::bool::ANY,
        ) {
            let r = region(radius_m);
            let eval = GeofenceEvaluator::new(EvaluatorConfig {
                hysteresis_m,
                accuracy_ceiling_m: 100.0,
            });
            let fix = fix_at(&r, offset_m, 5.0);
            let previous = if prev_inside {
                RegionStatus::Inside
            } else {
                RegionStatus::Outside
            };

            let status = eval.evaluate_region(&fix, &r, previous);
            let d = status.distance_m;

            if d <= radius_m {
                prop_assert_eq!(status.status, RegionStatus::Inside);
            } else if d > radius_m + hysteresis_m {
                prop_assert_eq!(status.status, RegionStatus::Outside);
            } else {
                // Hysteresis band: previous status retained.
                prop_assert_eq!(status.status, previous);
            }
        }
    }
}
